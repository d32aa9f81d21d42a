use crate::db::Session;
use crate::error::AppError;
use crate::middleware::RequestSession;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

/// The session opened by the transaction middleware (or shared by an enclosing batch).
#[derive(Clone)]
pub struct DbSession(pub Arc<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for DbSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestSession>()
            .map(|s| DbSession(s.0.clone()))
            .ok_or_else(|| AppError::Internal("route is not wrapped in a transaction scope".into()))
    }
}
