//! Authentication Middleware
//! Mission: Bind a verified session identity to every protected request

use crate::auth::{context::AuthContext, error::AuthError, jwt::JwtHandler};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";

/// Auth middleware that validates session tokens.
///
/// Only `Authorization: Bearer <token>` is accepted. Any failure yields
/// `Unauthenticated` before the request reaches a handler.
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers()).ok_or_else(|| {
        debug!(reason = "missing_or_malformed_header", "Request unauthenticated");
        AuthError::Unauthenticated
    })?;

    let context = jwt_handler
        .verify_session(token, Utc::now())
        .and_then(|claims| AuthContext::from_claims(&claims))
        .map_err(|reason| {
            debug!(%reason, "Request unauthenticated");
            AuthError::Unauthenticated
        })?;

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

/// Token from a well-formed bearer header, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
