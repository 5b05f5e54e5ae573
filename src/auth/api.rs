//! Authentication API Endpoints
//! Mission: Expose login, registration, password reset and user management over HTTP

use crate::auth::{
    context::AuthContext,
    error::AuthError,
    models::{
        LoginRequest, LoginResponse, MessageResponse, PasswordResetComplete,
        PasswordResetIssued, PasswordResetRequest, ProfileUpdateRequest, RegisterRequest, Role,
        UpdateRoleRequest, UserResponse,
    },
    service::AuthService,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::SecondsFormat;
use uuid::Uuid;

/// Register - POST /v1/auth/register
pub async fn register(
    State(service): State<AuthService>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AuthError> {
    let user = service
        .register(&payload.email, &payload.password, payload.role.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from_user(&user))))
}

/// Login - POST /v1/auth/login
pub async fn login(
    State(service): State<AuthService>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let outcome = service.login(&payload.email, &payload.password).await?;

    Ok(Json(LoginResponse {
        expires_in: outcome.session.expires_in(outcome.issued_at),
        token: outcome.session.token,
        role: outcome.user.role,
        user: UserResponse::from_user(&outcome.user),
    }))
}

/// Request a reset token - POST /v1/auth/password-reset/request
///
/// The token is returned in the body; delivering it out of band is the
/// caller's concern.
pub async fn request_password_reset(
    State(service): State<AuthService>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetIssued>, AuthError> {
    let issued = service.request_reset(&payload.email).await?;
    Ok(Json(PasswordResetIssued {
        reset_token: issued.token,
        expires_at: issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

/// Complete a reset - POST /v1/auth/password-reset/reset
pub async fn complete_password_reset(
    State(service): State<AuthService>,
    Json(payload): Json<PasswordResetComplete>,
) -> Result<Json<MessageResponse>, AuthError> {
    service
        .complete_reset(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// Current identity - GET /v1/profile
pub async fn get_profile(
    State(service): State<AuthService>,
    ctx: AuthContext,
) -> Result<Json<UserResponse>, AuthError> {
    let user = service.profile(ctx.user_id).await?;
    Ok(Json(UserResponse::from_user(&user)))
}

/// Update own email/password - PUT /v1/profile
pub async fn update_profile(
    State(service): State<AuthService>,
    ctx: AuthContext,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<UserResponse>, AuthError> {
    let user = service
        .update_profile(
            ctx.user_id,
            payload.email.as_deref(),
            payload.new_password.as_deref(),
        )
        .await?;
    Ok(Json(UserResponse::from_user(&user)))
}

/// List all users - GET /v1/admin/users (Admin only)
pub async fn list_users(
    State(service): State<AuthService>,
) -> Result<Json<Vec<UserResponse>>, AuthError> {
    let users = service.list_users().await?;
    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

/// Change a user's role - PUT /v1/admin/users/:id/role (Admin only)
pub async fn update_user_role(
    State(service): State<AuthService>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let user_id = parse_user_id(&user_id)?;
    let role = Role::parse(&payload.role).ok_or(AuthError::InvalidInput("unknown role"))?;

    service.update_role(user_id, role).await?;
    Ok(Json(MessageResponse::new(format!("Role updated to {role}"))))
}

/// Delete user - DELETE /v1/admin/users/:id (Admin only)
pub async fn delete_user(
    State(service): State<AuthService>,
    ctx: AuthContext,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AuthError> {
    let user_id = parse_user_id(&user_id)?;

    // Don't allow deleting yourself
    if user_id == ctx.user_id {
        return Err(AuthError::InvalidInput("cannot delete your own account"));
    }

    service.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /teacher-area
pub async fn teacher_area(ctx: AuthContext) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!("Welcome, teacher {}", ctx.email)))
}

/// GET /student-area
pub async fn student_area(ctx: AuthContext) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!("Welcome, student {}", ctx.email)))
}

/// Health check endpoint
pub async fn health() -> &'static str {
    "ok"
}

fn parse_user_id(raw: &str) -> Result<Uuid, AuthError> {
    Uuid::parse_str(raw).map_err(|_| AuthError::InvalidInput("invalid user id"))
}
