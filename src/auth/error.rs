//! Authentication Errors
//! Mission: One internal taxonomy, few external outcomes

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Seconds a client should wait before retrying after a store outage
const RETRY_AFTER_SECS: &str = "1";

/// Failures reported by a credential store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated")]
    Conflict,

    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// A stored record that can never be read back, such as an unknown role
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Errors surfaced by the authentication service and request guards.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("authentication required")]
    Unauthenticated,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("failed to issue token")]
    TokenIssuance,

    #[error("failed to hash password")]
    Hashing,

    #[error("credential store unavailable")]
    PersistenceUnavailable,

    #[error("stored record is unreadable")]
    CorruptRecord,

    #[error("email already registered")]
    EmailTaken,

    #[error("{0}")]
    InvalidInput(&'static str),
}

impl AuthError {
    /// Only store outages are worth retrying; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::PersistenceUnavailable)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::Unauthenticated
            | AuthError::InvalidOrExpiredToken => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::PersistenceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::TokenIssuance | AuthError::Hashing | AuthError::CorruptRecord => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::UserNotFound,
            StoreError::Conflict => AuthError::EmailTaken,
            StoreError::Unavailable(_) => AuthError::PersistenceUnavailable,
            StoreError::Corrupt(_) => AuthError::CorruptRecord,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AuthError::TokenIssuance | AuthError::Hashing | AuthError::CorruptRecord => {
                "Internal server error".to_string()
            }
            AuthError::PersistenceUnavailable => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        };

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], message).into_response();
        }

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_failures_collapse_to_two_outcomes() {
        let unauth = AuthError::Unauthenticated.into_response();
        assert_eq!(unauth.status(), StatusCode::UNAUTHORIZED);

        let expired = AuthError::InvalidOrExpiredToken.into_response();
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);

        let forbidden = AuthError::Forbidden.into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_infrastructure_faults_are_generic() {
        let hashing = AuthError::Hashing.into_response();
        assert_eq!(hashing.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let issuance = AuthError::TokenIssuance.into_response();
        assert_eq!(issuance.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_store_outage_is_retryable_and_distinct() {
        let err: AuthError = StoreError::Unavailable("disk I/O error".into()).into();
        assert!(err.is_retryable());
        assert!(!AuthError::InvalidCredentials.is_retryable());
        assert!(!AuthError::UserNotFound.is_retryable());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            AuthError::from(StoreError::NotFound),
            AuthError::UserNotFound
        ));
        assert!(matches!(
            AuthError::from(StoreError::Conflict),
            AuthError::EmailTaken
        ));
    }

    #[test]
    fn test_corrupt_record_is_terminal() {
        let err: AuthError = StoreError::Corrupt("unknown role 'superuser'".into()).into();
        assert!(matches!(err, AuthError::CorruptRecord));
        assert!(!err.is_retryable());

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.headers().contains_key(header::RETRY_AFTER));
    }
}
