//! Every request runs in a session: committed when the response is a success, rolled back otherwise.
//! Requests replayed by a batch reuse the batch's session and leave commit to the batch.

use crate::batch::BatchScope;
use crate::db::Session;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct RequestSession(pub Arc<Session>);

pub async fn transaction_scope(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if let Some(BatchScope(session)) = request.extensions().get::<BatchScope>().cloned() {
        request.extensions_mut().insert(RequestSession(session));
        return next.run(request).await;
    }

    let session = Arc::new(Session::new(state.databases.clone()));
    request.extensions_mut().insert(RequestSession(session.clone()));
    let response = next.run(request).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        session.rollback().await;
        return response;
    }
    match session.commit().await {
        Ok(()) => response,
        Err(e) => e.into_response(),
    }
}
