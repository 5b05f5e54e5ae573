//! Password Hashing
//! Mission: Salted, deliberately slow credential digests

use crate::auth::error::AuthError;
use bcrypt::{hash, verify};
use std::sync::{Arc, OnceLock};
use tracing::error;

/// Lowest and highest work factors bcrypt accepts
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// bcrypt ignores every byte past this point
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Reject plaintexts bcrypt would silently truncate
pub fn check_length(plaintext: &str) -> Result<(), AuthError> {
    if plaintext.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidInput("password must be at most 72 bytes"));
    }
    Ok(())
}

/// bcrypt wrapper with a configurable work factor.
///
/// Both operations are CPU-bound by design; async callers should run them on
/// a blocking thread.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    dummy_digest: Arc<OnceLock<Option<String>>>,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
            dummy_digest: Arc::new(OnceLock::new()),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> Result<String, AuthError> {
        check_length(plaintext)?;
        hash(plaintext, self.cost).map_err(|e| {
            error!(error = %e, "bcrypt hashing failed");
            AuthError::Hashing
        })
    }

    /// False on mismatch, on any digest bcrypt cannot parse, and on
    /// plaintexts too long to have been hashed here
    pub fn verify(&self, plaintext: &str, digest: &str) -> bool {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        verify(plaintext, digest).unwrap_or(false)
    }

    /// Burn the same work as a real verification, for lookups that found
    /// no user.
    pub fn verify_dummy(&self, plaintext: &str) {
        let digest = self
            .dummy_digest
            .get_or_init(|| hash("dummy-password-for-timing", self.cost).ok());
        if let Some(digest) = digest {
            let _ = verify(plaintext, digest);
        }
    }
}
