//! Entity CRUD handlers: list, create, read, update (PUT/PATCH), delete.

use crate::config::ResolvedEntity;
use crate::error::AppError;
use crate::extractors::{AuthUser, ClientIp, DbSession};
use crate::response::{success_many, success_one, success_one_ok};
use crate::service::{Actor, CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};

fn entity_for<'a>(state: &'a AppState, path_segment: &str, operation: &str) -> Result<&'a ResolvedEntity, AppError> {
    let entity = state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("resource '{}'", path_segment)))?;
    if !entity.allows(operation) {
        return Err(AppError::MethodNotAllowed(format!("{} on {}", operation, path_segment)));
    }
    Ok(entity)
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn parse_paging(params: &[(String, String)], key: &str) -> Result<Option<u32>, AppError> {
    match params.iter().find(|(k, _)| k == key) {
        Some((_, v)) => v
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key))),
        None => Ok(None),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    _user: AuthUser,
    DbSession(session): DbSession,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "list")?;
    let limit = parse_paging(&params, "limit")?;
    let offset = parse_paging(&params, "offset")?;
    let (rows, total) = CrudService::list(&state, &session, entity, &params, limit, offset).await?;
    Ok(success_many(rows, total.max(0) as u64))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    user: AuthUser,
    DbSession(session): DbSession,
    ClientIp(ip): ClientIp,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "create")?;
    let body = body_to_map(body)?;
    RequestValidator::validate(entity, &body)?;
    let actor = Actor::new(user.username, ip);
    let row = CrudService::create(&state, &session, entity, &body, &actor).await?;
    Ok(success_one(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    _user: AuthUser,
    DbSession(session): DbSession,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "read")?;
    let row = CrudService::read(&state, &session, entity, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} '{}'", entity.name, id)))?;
    Ok(success_one_ok(row))
}

async fn write(
    state: &AppState,
    path_segment: &str,
    id: &str,
    session: &crate::db::Session,
    actor: Actor,
    body: Value,
    partial: bool,
) -> Result<Value, AppError> {
    let entity = entity_for(state, path_segment, "update")?;
    let body = body_to_map(body)?;
    if partial {
        RequestValidator::validate_partial(entity, &body)?;
    } else {
        let mut full = body.clone();
        full.entry(entity.pk_column.clone())
            .or_insert_with(|| Value::String(id.to_string()));
        RequestValidator::validate(entity, &full)?;
    }
    CrudService::update(state, session, entity, id, &body, &actor)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} '{}'", entity.name, id)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    user: AuthUser,
    DbSession(session): DbSession,
    ClientIp(ip): ClientIp,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let row = write(&state, &path_segment, &id, &session, Actor::new(user.username, ip), body, false).await?;
    Ok(success_one_ok(row))
}

pub async fn partial_update(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    user: AuthUser,
    DbSession(session): DbSession,
    ClientIp(ip): ClientIp,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let row = write(&state, &path_segment, &id, &session, Actor::new(user.username, ip), body, true).await?;
    Ok(success_one_ok(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id)): Path<(String, String)>,
    _user: AuthUser,
    DbSession(session): DbSession,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "delete")?;
    if !CrudService::delete(&state, &session, entity, &id).await? {
        return Err(AppError::NotFound(format!("{} '{}'", entity.name, id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
