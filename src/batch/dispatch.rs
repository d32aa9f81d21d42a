//! In-process replay of a sub-request through the same router that serves real traffic.

use crate::db::Session;
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const MAX_REPLY_BYTES: usize = 16 * 1024 * 1024;

/// Marks a request as part of a batch; the transaction middleware joins this session.
#[derive(Clone)]
pub struct BatchScope(pub Arc<Session>);

pub struct ReplayRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub headers: HeaderMap,
    pub session: Arc<Session>,
}

#[derive(Debug)]
pub struct ReplayResponse {
    pub status: StatusCode,
    pub data: Value,
}

#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: ReplayRequest) -> Result<ReplayResponse, AppError>;
}

#[derive(Clone)]
pub struct RouterDispatcher {
    router: Router,
}

impl RouterDispatcher {
    pub fn new(router: Router) -> Self {
        RouterDispatcher { router }
    }
}

#[async_trait]
impl Dispatch for RouterDispatcher {
    async fn dispatch(&self, replay: ReplayRequest) -> Result<ReplayResponse, AppError> {
        let body = match &replay.body {
            Some(v) => Body::from(serde_json::to_vec(v).map_err(|e| AppError::Internal(e.to_string()))?),
            None => Body::empty(),
        };
        let mut request = Request::builder()
            .method(replay.method)
            .uri(replay.url.as_str())
            .body(body)
            .map_err(|e| AppError::BadRequest(format!("invalid url '{}': {}", replay.url, e)))?;
        *request.headers_mut() = replay.headers;
        if replay.body.is_some() {
            request
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        request.extensions_mut().insert(BatchScope(replay.session));

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});
        let status = response.status();
        let bytes = to_bytes(response.into_body(), MAX_REPLY_BYTES)
            .await
            .map_err(|e| AppError::Internal(format!("reading replay body: {}", e)))?;
        let data = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok(ReplayResponse { status, data })
    }
}
