//! Route assembly. The API router (everything except `/batch/`) is what batches replay into.

mod auth;
mod common;
mod entity;

pub use auth::auth_routes;
pub use common::common_routes;
pub use entity::entity_routes;

use crate::batch::{BatchExecutor, RouterDispatcher};
use crate::handlers::batch::{run as run_batch, BatchState};
use crate::middleware::transaction_scope;
use crate::state::AppState;
use axum::{middleware::from_fn_with_state, routing::post, Router};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Entity, auth and operational routes, each request inside a transaction scope.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .merge(entity_routes())
        .merge(auth_routes())
        .merge(common_routes())
        .layer(from_fn_with_state(state.clone(), transaction_scope))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// The full HTTP app: API routes plus `/batch/`, which replays into the API router.
pub fn build_app(state: AppState) -> Router {
    let api = api_router(state.clone());
    let batch = BatchState {
        executor: Arc::new(BatchExecutor::new(
            RouterDispatcher::new(api.clone()),
            state.databases.clone(),
        )),
    };
    Router::new()
        .route("/batch/", post(run_batch))
        .with_state(batch)
        .merge(api)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}
