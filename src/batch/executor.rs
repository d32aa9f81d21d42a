//! Sequential batch state machine: replay each option, abort on the first failure, commit at the end.

use crate::batch::{BatchOption, BatchResult, Dispatch, ReplayRequest};
use crate::db::{Databases, Session};
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;

#[derive(Debug)]
pub struct BatchOutcome {
    pub status: StatusCode,
    /// Empty unless every sub-request succeeded and the commit went through.
    pub results: Vec<BatchResult>,
}

impl BatchOutcome {
    fn failed(status: StatusCode) -> Self {
        BatchOutcome {
            status,
            results: Vec::new(),
        }
    }
}

pub struct BatchExecutor<D> {
    dispatcher: D,
    databases: Arc<Databases>,
}

impl<D: Dispatch> BatchExecutor<D> {
    pub fn new(dispatcher: D, databases: Arc<Databases>) -> Self {
        BatchExecutor { dispatcher, databases }
    }

    pub async fn execute(&self, options: Vec<BatchOption>, headers: &HeaderMap) -> BatchOutcome {
        let session = Arc::new(Session::new(self.databases.clone()));
        let total = options.len();
        let mut results = Vec::with_capacity(total);

        for (index, option) in options.into_iter().enumerate() {
            let Some(method) = option.method.batchable() else {
                return abort(&session, StatusCode::METHOD_NOT_ALLOWED, index, &option).await;
            };
            if !option.url.starts_with('/') {
                return abort(&session, StatusCode::BAD_REQUEST, index, &option).await;
            }
            let replay = ReplayRequest {
                method,
                url: option.url.clone(),
                body: option.data.clone(),
                headers: headers.clone(),
                session: session.clone(),
            };
            let reply = match self.dispatcher.dispatch(replay).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(index, url = %option.url, error = %e, "batch dispatch failed");
                    session.rollback().await;
                    return BatchOutcome::failed(StatusCode::INTERNAL_SERVER_ERROR);
                }
            };
            results.push(BatchResult {
                status_code: reply.status.as_u16(),
                data: reply.data,
            });
            if reply.status.is_client_error() || reply.status.is_server_error() {
                return abort(&session, reply.status, index, &option).await;
            }
        }

        if let Err(e) = session.commit().await {
            tracing::error!(error = %e, "batch commit failed");
            return BatchOutcome::failed(StatusCode::INTERNAL_SERVER_ERROR);
        }
        tracing::info!(requests = total, "batch committed");
        BatchOutcome {
            status: StatusCode::OK,
            results,
        }
    }
}

async fn abort(session: &Session, status: StatusCode, index: usize, option: &BatchOption) -> BatchOutcome {
    tracing::warn!(
        index,
        method = option.method.as_str(),
        url = %option.url,
        status = status.as_u16(),
        "batch aborted"
    );
    session.rollback().await;
    BatchOutcome::failed(status)
}
