//! Request Authorization Context
//! Mission: Carry the caller's identity from authentication to handlers

use crate::auth::{
    error::AuthError,
    jwt::TokenError,
    models::{Role, SessionClaims},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Identity bound to a request after its session token verified.
///
/// `role` is `None` when the token carried a role string this service does
/// not recognize; authorization treats that as no privileges at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: Option<Role>,
}

impl AuthContext {
    /// The single point where a raw role string becomes a [`Role`]
    pub fn from_claims(claims: &SessionClaims) -> Result<Self, TokenError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| TokenError::Malformed)?;
        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role: Role::parse(&claims.role),
        })
    }

    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        match self.role {
            Some(role) => allowed.contains(&role),
            None => false,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}
