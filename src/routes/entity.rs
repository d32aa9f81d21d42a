//! Entity CRUD routes. Handlers resolve the entity from the path segment.

use crate::handlers::entity::{create, delete, list, partial_update, read, update};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn entity_routes() -> Router<AppState> {
    Router::new()
        .route("/api/:path_segment/", get(list).post(create))
        .route(
            "/api/:path_segment/:id/",
            get(read).put(update).patch(partial_update).delete(delete),
        )
}
