//! E-learning Auth Library
//!
//! Login, session tokens, single-use password resets and role-based access
//! control for the e-learning API. The binary in `main.rs` wires these
//! modules to SQLite and an HTTP listener.

pub mod app;
pub mod auth;
pub mod config;
pub mod middleware;
