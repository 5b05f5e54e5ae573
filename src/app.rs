//! HTTP router assembly

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{api, auth_middleware, models::Role, AuthService, RbacLayer};
use crate::middleware::request_logging;

/// Build the full application router around a shared [`AuthService`].
///
/// Protected routes pass authentication first, then their RBAC allow-list.
pub fn router(service: AuthService) -> Router {
    // Public routes (login and reset bypass authentication)
    let public_routes = Router::new()
        .route("/health", get(api::health))
        .route("/v1/auth/register", post(api::register))
        .route("/v1/auth/login", post(api::login))
        .route(
            "/v1/auth/password-reset/request",
            post(api::request_password_reset),
        )
        .route(
            "/v1/auth/password-reset/reset",
            post(api::complete_password_reset),
        );

    let admin_routes = Router::new()
        .route("/v1/admin/users", get(api::list_users))
        .route("/v1/admin/users/:id/role", put(api::update_user_role))
        .route("/v1/admin/users/:id", delete(api::delete_user))
        .route_layer(RbacLayer::admin_only());

    let teacher_routes = Router::new()
        .route("/teacher-area", get(api::teacher_area))
        .route_layer(RbacLayer::allow([Role::Teacher]));

    let student_routes = Router::new()
        .route("/student-area", get(api::student_area))
        .route_layer(RbacLayer::allow([Role::Student]));

    // Any authenticated role
    let protected_routes = Router::new()
        .route("/v1/profile", get(api::get_profile).put(api::update_profile))
        .merge(admin_routes)
        .merge(teacher_routes)
        .merge(student_routes)
        .route_layer(middleware::from_fn_with_state(
            service.jwt(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}
