use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{LoginRequest, RegisterRequest, TokenResponse, UpdateUserRequest, UserEnvelope},
    services,
};
use crate::{
    auth::jwt::{AuthUser, JwtKeys},
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/login", post(login))
        .route("/users/me", get(get_me))
        .route("/users/:id", put(update_user))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserEnvelope>), AppError> {
    let Json(req) = payload?;
    let user = services::register(state.users.as_ref(), req).await?;
    Ok((StatusCode::CREATED, Json(UserEnvelope { user })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = payload?;
    let keys = JwtKeys::from_config(&state.config.jwt);
    let token = services::login(state.users.as_ref(), &keys, req).await?;
    Ok(Json(token))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserEnvelope>, AppError> {
    let user = services::get_user(state.users.as_ref(), user_id).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let Path(id) = id?;
    if caller != id {
        warn!(caller, user_id = id, "user update on foreign account");
        return Err(AppError::Forbidden("cannot modify another user"));
    }
    let Json(changes) = payload?;
    let user = services::update_user(state.users.as_ref(), id, changes).await?;
    Ok(Json(UserEnvelope { user }))
}
