//! `POST /batch/`: run a JSON array of sub-requests atomically.

use crate::batch::{forwarded_headers, BatchExecutor, BatchOption, RouterDispatcher};
use crate::error::AppError;
use crate::extractors::ClientIp;
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct BatchState {
    pub executor: Arc<BatchExecutor<RouterDispatcher>>,
}

pub async fn run(
    State(state): State<BatchState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let options: Vec<BatchOption> = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("batch payload must be an array of requests: {}", e)))?;
    let forwarded = forwarded_headers(&headers, ip.as_deref());
    let outcome = state.executor.execute(options, &forwarded).await;
    Ok((outcome.status, Json(outcome.results)).into_response())
}
