//! Login, token refresh, logout and the "who am I" view.

use crate::auth::tokens::{ACTIVE_COLUMN, TOKEN_COLUMN};
use crate::auth::TokenStore;
use crate::error::AppError;
use crate::extractors::{AuthUser, ClientIp, DbSession};
use crate::service::as_flag;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

/// User fields echoed back on login.
const PROFILE_COLUMNS: [&str; 3] = ["USER_ID", "NM", "EMAIL"];

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub token: String,
}

pub async fn login(
    State(state): State<AppState>,
    DbSession(session): DbSession,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let store = TokenStore::new(&state, &session);
    let user = store.authenticate(&req.username, &req.password).await?;
    let token = state.jwt.issue(&req.username)?;
    store.record_login(&req.username, &token, ip).await?;

    let profile: serde_json::Map<String, Value> = PROFILE_COLUMNS
        .iter()
        .map(|c| (c.to_string(), user.get(*c).cloned().unwrap_or(Value::Null)))
        .collect();
    Ok((StatusCode::CREATED, Json(json!({ "token": token, "user": profile }))))
}

pub async fn refresh(
    State(state): State<AppState>,
    DbSession(session): DbSession,
    ClientIp(ip): ClientIp,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (claims, token) = state.jwt.refresh(&req.token)?;
    let store = TokenStore::new(&state, &session);
    let user = store
        .find_user(&claims.username)
        .await?
        .ok_or_else(|| AppError::BadRequest("User doesn't exist.".into()))?;
    if !as_flag(user.get(ACTIVE_COLUMN)) {
        return Err(AppError::BadRequest("User account is disabled.".into()));
    }
    if user.get(TOKEN_COLUMN).and_then(Value::as_str) != Some(req.token.as_str()) {
        return Err(AppError::Forbidden("unregistered token".into()));
    }
    store.record_login(&claims.username, &token, ip).await?;
    Ok((StatusCode::CREATED, Json(json!({ "token": token }))))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    DbSession(session): DbSession,
) -> Result<impl IntoResponse, AppError> {
    TokenStore::new(&state, &session).revoke(&user.orig_username).await?;
    Ok(Json(json!({ "success": "Successfully logged out." })))
}

pub async fn whoami(user: AuthUser) -> Json<Value> {
    Json(json!({
        "username": user.username,
        "orig_username": user.orig_username,
    }))
}
