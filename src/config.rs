//! Service configuration resolved from the environment

use crate::auth::{models::Role, password};
use anyhow::{bail, Context, Result};
use std::{env, fmt, time::Duration};

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 72;
pub const DEFAULT_RESET_TTL_MINUTES: i64 = 60;
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RESET_SWEEP_SECS: u64 = 600;

/// Admin account created at startup when none exists with that email
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub reset_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    /// Role given to registrations that do not ask for one
    pub default_role: Role,
    /// Deadline for each credential store call
    pub store_timeout: Duration,
    pub reset_sweep_interval: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = get("JWT_SECRET").unwrap_or_default();
        if jwt_secret.trim().is_empty() {
            bail!("JWT_SECRET must be set to a non-empty value");
        }

        let session_hours: i64 = parse_or(&get, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)?;
        let reset_minutes: i64 = parse_or(&get, "RESET_TTL_MINUTES", DEFAULT_RESET_TTL_MINUTES)?;
        if session_hours <= 0 || reset_minutes <= 0 {
            bail!("SESSION_TTL_HOURS and RESET_TTL_MINUTES must be positive");
        }
        let session_ttl = chrono::Duration::try_hours(session_hours)
            .context("SESSION_TTL_HOURS is out of range")?;
        let reset_ttl = chrono::Duration::try_minutes(reset_minutes)
            .context("RESET_TTL_MINUTES is out of range")?;
        if reset_ttl >= session_ttl {
            bail!("RESET_TTL_MINUTES must be shorter than the session lifetime");
        }

        let bcrypt_cost: u32 = parse_or(&get, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(password::MIN_COST..=password::MAX_COST).contains(&bcrypt_cost) {
            bail!(
                "BCRYPT_COST must be between {} and {}",
                password::MIN_COST,
                password::MAX_COST
            );
        }

        let default_role = match get("DEFAULT_ROLE") {
            Some(raw) => Role::parse(raw.trim())
                .with_context(|| format!("DEFAULT_ROLE '{raw}' is not a known role"))?,
            None => Role::Student,
        };

        let store_timeout_ms: u64 = parse_or(&get, "STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS)?;
        let sweep_secs: u64 = parse_or(&get, "RESET_SWEEP_SECS", DEFAULT_RESET_SWEEP_SECS)?;
        if store_timeout_ms == 0 || sweep_secs == 0 {
            bail!("STORE_TIMEOUT_MS and RESET_SWEEP_SECS must be positive");
        }

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { email, password })
            }
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            jwt_secret,
            session_ttl,
            reset_ttl,
            bcrypt_cost,
            default_role,
            store_timeout: Duration::from_millis(store_timeout_ms),
            reset_sweep_interval: Duration::from_secs(sweep_secs),
            bootstrap_admin,
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("session_ttl_hours", &self.session_ttl.num_hours())
            .field("reset_ttl_minutes", &self.reset_ttl.num_minutes())
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("default_role", &self.default_role)
            .field("store_timeout", &self.store_timeout)
            .field("reset_sweep_interval", &self.reset_sweep_interval)
            .field(
                "bootstrap_admin",
                &self.bootstrap_admin.as_ref().map(|a| a.email.as_str()),
            )
            .finish()
    }
}
