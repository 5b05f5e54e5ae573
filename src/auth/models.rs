//! Authentication Models
//! Mission: Define identity, role and token claim structures

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User account as held by the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub role: Role,
    pub created_at: String,
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin, // User management
    #[serde(rename = "teacher")]
    Teacher, // Course and class operations
    #[serde(rename = "student")]
    Student, // Enrolled learner
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Teacher, Role::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Exact match on the wire name. Anything else is not a role.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a signed token may be used for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordReset,
}

/// Session JWT payload.
///
/// `role` stays a raw string on the wire; it is normalized into [`Role`]
/// exactly once, when the request context is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // subject (user_id)
    pub email: String,
    pub role: String,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64, // expiration timestamp (seconds)
}

/// Password reset JWT payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub jti: String, // unique per issuance
    pub email: String,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64, // seconds until expiration
    pub role: Role,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct PasswordResetIssued {
    pub reset_token: String,
    pub expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetComplete {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub created_at: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        let admin = Role::Admin;
        let json = serde_json::to_string(&admin).unwrap();
        assert_eq!(json, r#""admin""#);

        let teacher: Role = serde_json::from_str(r#""teacher""#).unwrap();
        assert_eq!(teacher, Role::Teacher);

        assert!(serde_json::from_str::<Role>(r#""superuser""#).is_err());
    }

    #[test]
    fn test_role_parse_is_exact() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }

        assert_eq!(Role::parse("ADMIN"), None);
        assert_eq!(Role::parse(" admin"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn test_password_hash_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            role: Role::Student,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$2b$04$secret"));

        let response = UserResponse::from_user(&user);
        assert_eq!(response.email, "alice@example.com");
        assert_eq!(response.role, Role::Student);
    }

    #[test]
    fn test_token_purpose_wire_names() {
        assert_eq!(
            serde_json::to_string(&TokenPurpose::PasswordReset).unwrap(),
            r#""password_reset""#
        );
        assert_eq!(
            serde_json::to_string(&TokenPurpose::Session).unwrap(),
            r#""session""#
        );
    }
}
