//! Generic CRUD execution: routes each statement to its alias, compiles it for join mode and
//! runs it on the request session.

use crate::auth::password::{hash_password, is_hashed};
use crate::config::{RelationSpec, ResolvedEntity};
use crate::db::Session;
use crate::error::AppError;
use crate::sql::{self, BindValue, QueryBuf, QueryKind};
use crate::state::AppState;
use serde_json::{Map, Value};
use sqlx::any::AnyRow;
use sqlx::Row;

/// Query-string keys that are never column filters.
const RESERVED_PARAMS: &[&str] = &["limit", "offset", "page", "format"];

/// Who is writing; stamped into audit columns.
#[derive(Clone, Debug)]
pub struct Actor {
    pub user_id: String,
    pub ip: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, ip: Option<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            ip,
        }
    }

    fn ip(&self) -> &str {
        self.ip.as_deref().unwrap_or("127.0.0.1")
    }
}

pub struct CrudService;

impl CrudService {
    /// List rows with exact-match filters; returns the page and the filtered total.
    pub async fn list(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        query: &[(String, String)],
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<(Vec<Value>, i64), AppError> {
        let alias = state.router.read_alias(entity);
        let engine = state.databases.engine(alias)?;
        let filters = filters_from_query(entity, query);
        let joins = joinable(state, entity);

        let page = state
            .compiler
            .select(&sql::select_list(engine, entity, &joins, &filters, limit, offset));
        let rows = session.fetch_all(alias, &page).await?;

        let total = sql::count(engine, entity, &filters);
        let total = state.compiler.statement(QueryKind::Aggregate, total.assemble(&total.from));
        let total = match session.fetch_optional(alias, &total).await? {
            Some(row) => row.try_get::<i64, _>(0)?,
            None => 0,
        };
        Ok((rows.iter().map(|r| present(entity, row_to_json(r))).collect(), total))
    }

    /// Fetch one row by primary key, relations expanded where they can be joined.
    pub async fn read(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        id: &str,
    ) -> Result<Option<Value>, AppError> {
        let alias = state.router.read_alias(entity);
        let engine = state.databases.engine(alias)?;
        let joins = joinable(state, entity);
        let q = state
            .compiler
            .select(&sql::select_by_id(engine, entity, &joins, pk_value(entity, id)));
        let row = session.fetch_optional(alias, &q).await?;
        Ok(row.map(|r| present(entity, row_to_json(&r))))
    }

    /// First row where `column = value`, unstripped. Used by authentication lookups.
    pub async fn find_by(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        column: &str,
        value: BindValue,
    ) -> Result<Option<Value>, AppError> {
        let alias = state.router.read_alias(entity);
        let engine = state.databases.engine(alias)?;
        let q = state.compiler.select(&sql::select_list(
            engine,
            entity,
            &[],
            &[(column.to_string(), value)],
            Some(1),
            None,
        ));
        let row = session.fetch_optional(alias, &q).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    /// Insert one row. A missing primary key is derived from `key_from` when configured.
    pub async fn create(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
        actor: &Actor,
    ) -> Result<Value, AppError> {
        let alias = state.router.write_alias(entity);
        let engine = state.databases.engine(alias)?;
        let mut values = column_values(state, entity, body)?;

        if !values.iter().any(|(c, _)| *c == entity.pk_column) && !entity.key_from.is_empty() {
            let key = derive_key(entity, body)?;
            values.insert(0, (entity.pk_column.clone(), BindValue::coerce(&Value::String(key), entity.pk_kind)));
        }
        if entity.audit {
            let now = chrono::Utc::now().to_rfc3339();
            set(&mut values, "INS_USER_ID", BindValue::text(&actor.user_id));
            set(&mut values, "INS_USER_IP", BindValue::text(actor.ip()));
            set(&mut values, "INS_DT", BindValue::text(&now));
            set(&mut values, "UPD_DT", BindValue::text(now));
        }

        let q = state
            .compiler
            .statement(QueryKind::Insert, sql::insert(engine, entity, &values));
        if engine.supports_returning() {
            let row = session
                .fetch_optional(alias, &q)
                .await?
                .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
            return Ok(present(entity, row_to_json(&row)));
        }

        let done = session.execute(alias, &q).await?;
        let id = match values.iter().find(|(c, _)| *c == entity.pk_column) {
            Some((_, v)) => v.clone(),
            None => done
                .last_insert_id()
                .map(BindValue::I64)
                .ok_or_else(|| AppError::Internal("inserted row has no key".into()))?,
        };
        let row = Self::reselect(state, session, entity, id)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        Ok(present(entity, row))
    }

    /// Update one row by id. `Ok(None)` when no such row exists.
    pub async fn update(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        id: &str,
        body: &Map<String, Value>,
        actor: &Actor,
    ) -> Result<Option<Value>, AppError> {
        let id = pk_value(entity, id);
        let Some(existing) = Self::reselect(state, session, entity, id.clone()).await? else {
            return Ok(None);
        };
        let mut sets = column_values(state, entity, body)?;
        sets.retain(|(c, _)| *c != entity.pk_column);
        if sets.is_empty() {
            return Ok(Some(present(entity, existing)));
        }
        if entity.audit {
            set(&mut sets, "UPD_USER_ID", BindValue::text(&actor.user_id));
            set(&mut sets, "UPD_USER_IP", BindValue::text(actor.ip()));
            set(&mut sets, "UPD_DT", BindValue::text(chrono::Utc::now().to_rfc3339()));
        }
        Self::set_columns(state, session, entity, id.clone(), &sets).await?;
        let row = Self::reselect(state, session, entity, id).await?;
        Ok(row.map(|r| present(entity, r)))
    }

    /// Plain UPDATE by primary key without audit stamping; returns rows affected.
    pub async fn set_columns(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        id: BindValue,
        sets: &[(String, BindValue)],
    ) -> Result<u64, AppError> {
        let alias = state.router.write_alias(entity);
        let engine = state.databases.engine(alias)?;
        let Some(q) = sql::update(engine, entity, id, sets) else {
            return Ok(0);
        };
        let q = state.compiler.statement(QueryKind::Update, q);
        Ok(session.execute(alias, &q).await?.rows_affected())
    }

    /// Delete one row by id. Returns whether a row was removed.
    pub async fn delete(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        id: &str,
    ) -> Result<bool, AppError> {
        let n = Self::delete_where(state, session, entity, &entity.pk_column, pk_value(entity, id)).await?;
        Ok(n > 0)
    }

    pub async fn delete_where(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        column: &str,
        value: BindValue,
    ) -> Result<u64, AppError> {
        let alias = state.router.write_alias(entity);
        let engine = state.databases.engine(alias)?;
        let q = state
            .compiler
            .statement(QueryKind::Delete, sql::delete_where(engine, entity, column, value));
        Ok(session.execute(alias, &q).await?.rows_affected())
    }

    /// Read back through the write alias so a request never reads its own write on another connection.
    async fn reselect(
        state: &AppState,
        session: &Session,
        entity: &ResolvedEntity,
        id: BindValue,
    ) -> Result<Option<Value>, AppError> {
        let alias = state.router.write_alias(entity);
        let engine = state.databases.engine(alias)?;
        let q: QueryBuf = state.compiler.select(&sql::select_by_id(engine, entity, &[], id));
        let row = session.fetch_optional(alias, &q).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }
}

/// Relations whose related entity is known and joinable from this entity's read alias.
fn joinable<'a>(state: &AppState, entity: &'a ResolvedEntity) -> Vec<&'a RelationSpec> {
    entity
        .relations
        .iter()
        .filter(|rel| {
            state
                .model
                .entity_by_name(&rel.related)
                .map_or(false, |related| state.router.can_join(entity, related))
        })
        .collect()
}

fn filters_from_query(entity: &ResolvedEntity, query: &[(String, String)]) -> Vec<(String, BindValue)> {
    query
        .iter()
        .filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str()))
        .filter_map(|(k, v)| {
            let col = entity.column(k)?;
            Some((k.clone(), BindValue::coerce(&Value::String(v.clone()), col.kind)))
        })
        .collect()
}

fn pk_value(entity: &ResolvedEntity, id: &str) -> BindValue {
    BindValue::coerce(&Value::String(id.to_string()), entity.pk_kind)
}

/// Body values for known columns, in column order, coerced and hashed where configured.
fn column_values(
    state: &AppState,
    entity: &ResolvedEntity,
    body: &Map<String, Value>,
) -> Result<Vec<(String, BindValue)>, AppError> {
    let mut values = Vec::new();
    for col in &entity.columns {
        let Some(v) = body.get(&col.name) else { continue };
        let bound = match v.as_str() {
            Some(raw) if entity.hashed_columns.contains(&col.name) && !is_hashed(raw) => {
                BindValue::text(hash_password(raw, state.security.password_iterations)?)
            }
            _ => BindValue::coerce(v, col.kind),
        };
        values.push((col.name.clone(), bound));
    }
    Ok(values)
}

fn derive_key(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<String, AppError> {
    let mut parts = Vec::with_capacity(entity.key_from.len());
    for col in &entity.key_from {
        match body.get(col) {
            Some(Value::String(s)) if !s.is_empty() => parts.push(s.clone()),
            Some(Value::Number(n)) => parts.push(n.to_string()),
            _ => return Err(AppError::field(col, "This field is required.")),
        }
    }
    Ok(parts.join("/"))
}

fn set(values: &mut Vec<(String, BindValue)>, column: &str, value: BindValue) {
    match values.iter_mut().find(|(c, _)| c == column) {
        Some(slot) => slot.1 = value,
        None => values.push((column.to_string(), value)),
    }
}

fn present(entity: &ResolvedEntity, mut row: Value) -> Value {
    if let Value::Object(map) = &mut row {
        for col in &entity.sensitive_columns {
            map.remove(col);
        }
    }
    row
}

fn row_to_json(row: &AnyRow) -> Value {
    use sqlx::Column;
    let mut map = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        map.insert(col.name().to_string(), cell_to_value(row, i));
    }
    Value::Object(map)
}

fn cell_to_value(row: &AnyRow, i: usize) -> Value {
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(i) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(i) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(i) {
        return Value::Bool(b);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(i) {
        return Value::String(s);
    }
    Value::Null
}

/// Truthiness of a stored flag column such as `IS_ACTIVE`.
pub(crate) fn as_flag(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().map_or(false, |n| n != 0),
        Some(Value::String(s)) => matches!(s.as_str(), "1" | "Y" | "y" | "true"),
        _ => false,
    }
}
