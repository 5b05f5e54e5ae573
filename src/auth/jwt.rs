//! JWT Token Handler
//! Mission: Sign and verify session and reset tokens (HS256 only)

use crate::auth::models::{ResetClaims, SessionClaims, TokenPurpose, User};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// The only algorithm this service signs with or accepts
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Why a token failed verification. Never shown to clients.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("signature mismatch")]
    Signature,

    #[error("unexpected signing algorithm")]
    Algorithm,

    #[error("token used for the wrong purpose")]
    Purpose,

    #[error("token has expired")]
    Expired,
}

/// A freshly signed token and the instant it stops being valid
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at.timestamp() - now.timestamp()).max(0)
    }
}

trait Expiring {
    fn exp(&self) -> i64;
    fn purpose(&self) -> TokenPurpose;
}

impl Expiring for SessionClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn purpose(&self) -> TokenPurpose {
        self.purpose
    }
}

impl Expiring for ResetClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn purpose(&self) -> TokenPurpose {
        self.purpose
    }
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding: EncodingKey,
    decoding: DecodingKey,
    session_ttl: Duration,
    reset_ttl: Duration,
}

impl JwtHandler {
    /// Create a handler from a non-empty shared secret.
    ///
    /// Secret validation happens at config load; see `AuthConfig`.
    pub fn new(secret: &str, session_ttl: Duration, reset_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            session_ttl,
            reset_ttl,
        }
    }

    /// Generate a session token for a user
    pub fn issue_session(&self, user: &User, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now
            .checked_add_signed(self.session_ttl)
            .context("Invalid session expiry")?;

        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            purpose: TokenPurpose::Session,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        debug!(user_id = %user.id, role = %user.role, "Issuing session token");

        let token = self.sign(&claims).context("Failed to sign session token")?;
        Ok(IssuedToken {
            token,
            expires_at: at_second(expires_at.timestamp())?,
        })
    }

    /// Generate a password reset token bound to an email
    pub fn issue_reset(&self, email: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now
            .checked_add_signed(self.reset_ttl)
            .context("Invalid reset expiry")?;

        let claims = ResetClaims {
            jti: Uuid::new_v4().to_string(),
            email: email.to_string(),
            purpose: TokenPurpose::PasswordReset,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = self.sign(&claims).context("Failed to sign reset token")?;
        Ok(IssuedToken {
            token,
            expires_at: at_second(expires_at.timestamp())?,
        })
    }

    /// Validate a session token at `now` and extract its claims
    pub fn verify_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, TokenError> {
        self.verify(token, TokenPurpose::Session, now)
    }

    /// Validate a reset token at `now` and extract its claims
    pub fn verify_reset(&self, token: &str, now: DateTime<Utc>) -> Result<ResetClaims, TokenError> {
        self.verify(token, TokenPurpose::PasswordReset, now)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> jsonwebtoken::errors::Result<String> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding)
    }

    fn verify<T>(&self, token: &str, purpose: TokenPurpose, now: DateTime<Utc>) -> Result<T, TokenError>
    where
        T: DeserializeOwned + Expiring,
    {
        let header = decode_header(token).map_err(|_| TokenError::Malformed)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Algorithm);
        }

        // Expiry is checked below against the caller's clock, with no leeway.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp"]);

        let decoded = decode::<T>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::Signature,
            ErrorKind::InvalidAlgorithm => TokenError::Algorithm,
            _ => TokenError::Malformed,
        })?;

        let claims = decoded.claims;
        if claims.purpose() != purpose {
            return Err(TokenError::Purpose);
        }
        if now.timestamp() >= claims.exp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn at_second(ts: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .context("Timestamp out of range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;

    fn handler(secret: &str) -> JwtHandler {
        JwtHandler::new(secret, Duration::hours(72), Duration::hours(1))
    }

    fn create_test_user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: "testuser@example.com".to_string(),
            password_hash: "hash".to_string(),
            role,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_session_generation_and_validation() {
        let handler = handler("test-secret-key-12345");
        let user = create_test_user(Role::Teacher);
        let now = Utc::now();

        let issued = handler.issue_session(&user, now).unwrap();
        assert!(!issued.token.is_empty());
        assert_eq!(issued.expires_in(now), 72 * 3600);

        let claims = handler.verify_session(&issued.token, now).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.role, "teacher");
        assert_eq!(claims.email, user.email);
    }

    #[test]
    fn test_session_rejected_at_and_after_expiry() {
        let handler = handler("test-secret-key-12345");
        let user = create_test_user(Role::Student);
        let issued_at = Utc::now();
        let issued = handler.issue_session(&user, issued_at).unwrap();

        let just_before = issued_at + Duration::hours(72) - Duration::seconds(1);
        assert!(handler.verify_session(&issued.token, just_before).is_ok());

        for later in [
            issued_at + Duration::hours(72),
            issued_at + Duration::hours(72) + Duration::seconds(1),
            issued_at + Duration::days(30),
        ] {
            assert_eq!(
                handler.verify_session(&issued.token, later).unwrap_err(),
                TokenError::Expired
            );
        }
    }

    #[test]
    fn test_invalid_token_rejected() {
        let handler = handler("test-secret-key-12345");

        assert_eq!(
            handler.verify_session("invalid.token.here", Utc::now()).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(
            handler.verify_session("", Utc::now()).unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn test_different_secrets_reject() {
        let handler1 = handler("secret1");
        let handler2 = handler("secret2");
        let user = create_test_user(Role::Admin);
        let now = Utc::now();

        let issued = handler1.issue_session(&user, now).unwrap();
        assert_eq!(
            handler2.verify_session(&issued.token, now).unwrap_err(),
            TokenError::Signature
        );
    }

    #[test]
    fn test_unexpected_algorithm_rejected() {
        let handler = handler("shared-secret");
        let now = Utc::now();
        let claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            email: "mallory@example.com".to_string(),
            role: "admin".to_string(),
            purpose: TokenPurpose::Session,
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };

        let hs512 = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(b"shared-secret"),
        )
        .unwrap();
        assert_eq!(
            handler.verify_session(&hs512, now).unwrap_err(),
            TokenError::Algorithm
        );

        // Hand-built unsigned token: {"alg":"none","typ":"JWT"}
        let unsigned = format!(
            "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{}.",
            hs512.split('.').nth(1).unwrap()
        );
        assert!(handler.verify_session(&unsigned, now).is_err());
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let handler = handler("test-secret-key-12345");
        let user = create_test_user(Role::Student);
        let now = Utc::now();

        let reset = handler.issue_reset(&user.email, now).unwrap();
        assert!(handler.verify_session(&reset.token, now).is_err());

        let session = handler.issue_session(&user, now).unwrap();
        assert!(handler.verify_reset(&session.token, now).is_err());
    }

    #[test]
    fn test_reset_token_window() {
        let handler = handler("test-secret-key-12345");
        let now = Utc::now();

        let reset = handler.issue_reset("alice@example.com", now).unwrap();
        let claims = handler.verify_reset(&reset.token, now).unwrap();
        assert_eq!(claims.email, "alice@example.com");

        let again = handler.issue_reset("alice@example.com", now).unwrap();
        assert_ne!(reset.token, again.token);

        assert_eq!(
            handler
                .verify_reset(&reset.token, now + Duration::hours(1))
                .unwrap_err(),
            TokenError::Expired
        );
    }
}
