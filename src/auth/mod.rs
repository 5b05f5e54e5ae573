//! Authentication Module
//! Mission: Secure API access with session tokens, password resets and RBAC

pub mod api;
pub mod context;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod rbac;
pub mod reset_store;
pub mod service;
pub mod user_store;

pub use context::AuthContext;
pub use error::{AuthError, StoreError};
pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use models::{Role, User};
pub use rbac::RbacLayer;
pub use reset_store::{InMemoryResetTokenStore, ResetTokenStore};
pub use service::AuthService;
pub use user_store::{CredentialStore, SqliteUserStore};
