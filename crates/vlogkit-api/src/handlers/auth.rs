//! Registration, login and user info handlers.

use axum::extract::{FromRef, Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use vlogkit_models::User;

use crate::auth::{AuthUser, JwtKeys};
use crate::error::{ApiError, ApiResult};
use crate::password::{hash_password, verify_password};
use crate::services::require_self;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::malformed("username and password are required"));
    }

    let password_hash =
        hash_password(&request.password).map_err(|e| ApiError::internal(e.to_string()))?;

    let user = state
        .store
        .create_user(request.username.trim(), request.email.trim(), &password_hash)
        .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    // One message for both unknown user and bad password.
    let denied = || ApiError::unauthorized("incorrect username or password");

    let user = state
        .store
        .get_user_by_username(&request.username)
        .await?
        .ok_or_else(denied)?;

    let valid = verify_password(&request.password, &user.password_hash)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    if !valid {
        return Err(denied());
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys
        .sign(user.id)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
        "expires_in": keys.ttl_secs(),
        "user": user,
    })))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<User>> {
    require_self(&user, user_id)?;

    let target = state
        .store
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(target))
}
