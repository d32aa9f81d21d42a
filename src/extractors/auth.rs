//! Authenticated principal, resolved from the bearer token against the user's registered token.

use crate::auth::tokens::{ACTIVE_COLUMN, TOKEN_COLUMN};
use crate::auth::TokenStore;
use crate::error::AppError;
use crate::extractors::DbSession;
use crate::service::as_flag;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use serde_json::Value;

/// Switches the effective user for the request; the token owner stays in `orig_username`.
pub const TRANSFER_USER_HEADER: &str = "X-Transfer-User";

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub username: String,
    /// Owner of the token. Equal to `username` unless the request was transferred.
    pub orig_username: String,
    pub token: String,
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let missing = || AppError::Unauthorized("Authentication credentials were not provided.".into());
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(missing)?;
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("JWT "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(missing)?;
    Ok(token.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = state.jwt.decode(&token)?;
        let DbSession(session) = DbSession::from_request_parts(parts, state).await?;
        let store = TokenStore::new(state, &session);

        let user = store
            .find_user(&claims.username)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found.".into()))?;
        if !as_flag(user.get(ACTIVE_COLUMN)) {
            return Err(AppError::Unauthorized("User account is disabled.".into()));
        }
        if user.get(TOKEN_COLUMN).and_then(Value::as_str) != Some(token.as_str()) {
            return Err(AppError::Forbidden("unregistered token".into()));
        }

        let transfer = parts
            .headers
            .get(TRANSFER_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        let username = match transfer {
            Some(target) => {
                if target == claims.username || store.find_user(&target).await?.is_none() {
                    return Err(AppError::Forbidden("transfer user not found".into()));
                }
                tracing::info!(from = %claims.username, to = %target, "user transferred");
                target
            }
            None => claims.username.clone(),
        };
        Ok(AuthUser {
            username,
            orig_username: claims.username,
            token,
        })
    }
}
