use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
            MessageResponse, PublicUser, RegisterRequest, ResetPasswordRequest,
        },
        error::AuthError,
        extractors::{JsonBody, RequireAdmin},
        jwt::AuthUser,
        services,
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/users/:id", get(get_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::register(&state, payload).await?;
    Ok(Json(MessageResponse::new("User registered successfully")))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    services::login(&state, payload).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AuthError> {
    services::forgot_password(&state, payload, OffsetDateTime::now_utc())
        .await
        .map(Json)
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    services::reset_password(&state, &token, payload, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::new(
        "Password has been reset successfully.",
    )))
}

#[instrument(skip_all, fields(user_id = %auth.id, username = %auth.username, role = %auth.role))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    services::profile(&state, &auth).await.map(Json)
}

#[instrument(skip_all, fields(admin_id = %admin.id, admin = %admin.username, target = %id))]
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AuthError> {
    services::user_by_id(&state, id).await.map(Json)
}
