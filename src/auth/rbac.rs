//! Role-based access control layer.
//!
//! Runs after [`auth_middleware`](crate::auth::middleware::auth_middleware)
//! and checks the bound role against a fixed allow-list per route group.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::auth::{context::AuthContext, error::AuthError, models::Role};

/// Allow-list check shared by the layer and handlers. Fails closed: no
/// context, no recognized role, or a role outside the list is `Forbidden`.
pub fn authorize(ctx: Option<&AuthContext>, allowed: &[Role]) -> Result<(), AuthError> {
    match ctx {
        Some(ctx) if ctx.has_any_role(allowed) => Ok(()),
        Some(ctx) => {
            warn!(
                user_id = %ctx.user_id,
                role = ?ctx.role,
                allowed = ?allowed,
                "Permission denied"
            );
            Err(AuthError::Forbidden)
        }
        None => {
            // Authorization mounted without authentication in front of it.
            warn!("No auth context found, denying access");
            Err(AuthError::Forbidden)
        }
    }
}

/// Layer restricting a route group to the given roles
#[derive(Clone)]
pub struct RbacLayer {
    allowed: Arc<[Role]>,
}

impl RbacLayer {
    pub fn allow(roles: impl Into<Vec<Role>>) -> Self {
        let roles: Vec<Role> = roles.into();
        Self {
            allowed: roles.into(),
        }
    }

    pub fn admin_only() -> Self {
        Self::allow([Role::Admin])
    }
}

impl<S> Layer<S> for RbacLayer {
    type Service = RbacMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RbacMiddleware {
            inner,
            allowed: self.allowed.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RbacMiddleware<S> {
    inner: S,
    allowed: Arc<[Role]>,
}

impl<S> Service<Request<Body>> for RbacMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let allowed = self.allowed.clone();
        // Take the service that was driven to readiness; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match authorize(req.extensions().get::<AuthContext>(), &allowed) {
                Ok(()) => inner.call(req).await,
                Err(err) => Ok(err.into_response()),
            }
        })
    }
}
