//! Builds parameterized SELECT, COUNT, INSERT, UPDATE and DELETE from a resolved entity.
//! Identifiers come from config only; values always travel as parameters.

use crate::config::{RelationSpec, ResolvedEntity};
use crate::db::EngineKind;
use crate::sql::BindValue;

/// Alias of the base table in every generated SELECT.
pub const BASE_ALIAS: &str = "t0";
pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

/// Output key of an expanded relation column.
pub fn relation_key(relation: &str, column: &str) -> String {
    format!("{}__{}", relation, column)
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    pub fn new(sql: impl Into<String>) -> Self {
        QueryBuf {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// A SELECT kept in parts so the FROM clause can be rewritten on its own.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    pub columns: String,
    pub from: String,
    /// WHERE / ORDER BY / pagination; the only part carrying placeholders.
    pub tail: String,
    pub params: Vec<BindValue>,
}

impl SelectQuery {
    pub fn assemble(&self, from: &str) -> QueryBuf {
        QueryBuf {
            sql: format!("SELECT {} FROM {}{}", self.columns, from, self.tail),
            params: self.params.clone(),
        }
    }
}

struct Params {
    engine: EngineKind,
    values: Vec<BindValue>,
}

impl Params {
    fn new(engine: EngineKind) -> Self {
        Params {
            engine,
            values: Vec::new(),
        }
    }

    fn push(&mut self, v: BindValue) -> String {
        self.values.push(v);
        self.engine.placeholder(self.values.len())
    }
}

fn aliased(engine: EngineKind, alias: &str, column: &str) -> String {
    format!("{}.{}", engine.quote_name(alias), engine.quote_name(column))
}

fn join_alias(i: usize) -> String {
    format!("j{}", i + 1)
}

fn select_columns(engine: EngineKind, entity: &ResolvedEntity, joins: &[&RelationSpec]) -> String {
    let mut parts: Vec<String> = entity
        .columns
        .iter()
        .map(|c| format!("{} AS {}", aliased(engine, BASE_ALIAS, &c.name), engine.quote_name(&c.name)))
        .collect();
    for (i, rel) in joins.iter().enumerate() {
        let alias = join_alias(i);
        for col in &rel.expand {
            parts.push(format!(
                "{} AS {}",
                aliased(engine, &alias, col),
                engine.quote_name(&relation_key(&rel.name, col))
            ));
        }
    }
    parts.join(", ")
}

fn from_clause(engine: EngineKind, entity: &ResolvedEntity, joins: &[&RelationSpec]) -> String {
    let mut from = format!(
        "{} AS {}",
        engine.quote_name(&entity.table_name),
        engine.quote_name(BASE_ALIAS)
    );
    for (i, rel) in joins.iter().enumerate() {
        let alias = join_alias(i);
        from.push_str(&format!(
            " LEFT JOIN {} AS {} ON {} = {}",
            engine.quote_name(&rel.related_table),
            engine.quote_name(&alias),
            aliased(engine, &alias, &rel.related_pk),
            aliased(engine, BASE_ALIAS, &rel.column)
        ));
    }
    from
}

fn where_clause(engine: EngineKind, entity: &ResolvedEntity, filters: &[(String, BindValue)], params: &mut Params) -> String {
    let parts: Vec<String> = filters
        .iter()
        .filter(|(col, _)| entity.column(col).is_some())
        .map(|(col, v)| format!("{} = {}", aliased(engine, BASE_ALIAS, col), params.push(v.clone())))
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn order_clause(engine: EngineKind, entity: &ResolvedEntity) -> String {
    let keys: Vec<String> = if entity.ordering.is_empty() {
        vec![aliased(engine, BASE_ALIAS, &entity.pk_column)]
    } else {
        entity
            .ordering
            .iter()
            .map(|(col, desc)| {
                let key = aliased(engine, BASE_ALIAS, col);
                if *desc {
                    format!("{} DESC", key)
                } else {
                    key
                }
            })
            .collect()
    };
    format!(" ORDER BY {}", keys.join(", "))
}

/// List with exact-match filters, ordering and pagination (default 100, max 1000).
/// Each relation in `joins` is LEFT JOINed and its expand columns selected as `rel__COL`.
pub fn select_list(
    engine: EngineKind,
    entity: &ResolvedEntity,
    joins: &[&RelationSpec],
    filters: &[(String, BindValue)],
    limit: Option<u32>,
    offset: Option<u32>,
) -> SelectQuery {
    let mut params = Params::new(engine);
    let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = offset.unwrap_or(0);
    let tail = format!(
        "{}{}{}",
        where_clause(engine, entity, filters, &mut params),
        order_clause(engine, entity),
        engine.limit_offset(limit, offset)
    );
    SelectQuery {
        columns: select_columns(engine, entity, joins),
        from: from_clause(engine, entity, joins),
        tail,
        params: params.values,
    }
}

/// SELECT by primary key.
pub fn select_by_id(engine: EngineKind, entity: &ResolvedEntity, joins: &[&RelationSpec], id: BindValue) -> SelectQuery {
    let mut params = Params::new(engine);
    let tail = format!(" WHERE {} = {}", aliased(engine, BASE_ALIAS, &entity.pk_column), params.push(id));
    SelectQuery {
        columns: select_columns(engine, entity, joins),
        from: from_clause(engine, entity, joins),
        tail,
        params: params.values,
    }
}

/// Total row count under the same filters as `select_list`; the single column is `count`.
pub fn count(engine: EngineKind, entity: &ResolvedEntity, filters: &[(String, BindValue)]) -> SelectQuery {
    let mut params = Params::new(engine);
    let tail = where_clause(engine, entity, filters, &mut params);
    SelectQuery {
        columns: format!("COUNT(*) AS {}", engine.quote_name("count")),
        from: from_clause(engine, entity, &[]),
        tail,
        params: params.values,
    }
}

/// INSERT of the given columns. Engines with RETURNING hand the stored row back.
pub fn insert(engine: EngineKind, entity: &ResolvedEntity, values: &[(String, BindValue)]) -> QueryBuf {
    let mut params = Params::new(engine);
    let table = engine.quote_name(&entity.table_name);
    let mut sql = if values.is_empty() {
        match engine {
            EngineKind::Mysql => format!("INSERT INTO {} () VALUES ()", table),
            _ => format!("INSERT INTO {} DEFAULT VALUES", table),
        }
    } else {
        let cols: Vec<String> = values.iter().map(|(c, _)| engine.quote_name(c)).collect();
        let placeholders: Vec<String> = values.iter().map(|(_, v)| params.push(v.clone())).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    if engine.supports_returning() {
        let returning: Vec<String> = entity.columns.iter().map(|c| engine.quote_name(&c.name)).collect();
        sql.push_str(&format!(" RETURNING {}", returning.join(", ")));
    }
    QueryBuf {
        sql,
        params: params.values,
    }
}

/// UPDATE by primary key. `None` when there is nothing to set.
pub fn update(
    engine: EngineKind,
    entity: &ResolvedEntity,
    id: BindValue,
    sets: &[(String, BindValue)],
) -> Option<QueryBuf> {
    let mut params = Params::new(engine);
    let assignments: Vec<String> = sets
        .iter()
        .filter(|(c, _)| *c != entity.pk_column)
        .map(|(c, v)| format!("{} = {}", engine.quote_name(c), params.push(v.clone())))
        .collect();
    if assignments.is_empty() {
        return None;
    }
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        engine.quote_name(&entity.table_name),
        assignments.join(", "),
        engine.quote_name(&entity.pk_column),
        params.push(id)
    );
    Some(QueryBuf {
        sql,
        params: params.values,
    })
}

/// DELETE by primary key.
pub fn delete(engine: EngineKind, entity: &ResolvedEntity, id: BindValue) -> QueryBuf {
    delete_where(engine, entity, &entity.pk_column, id)
}

/// DELETE every row whose `column` equals `value`.
pub fn delete_where(engine: EngineKind, entity: &ResolvedEntity, column: &str, value: BindValue) -> QueryBuf {
    let mut params = Params::new(engine);
    let sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        engine.quote_name(&entity.table_name),
        engine.quote_name(column),
        params.push(value)
    );
    QueryBuf {
        sql,
        params: params.values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolved::entity_fixture;
    use crate::config::ValueKind;

    fn relation() -> RelationSpec {
        RelationSpec {
            name: "menu".into(),
            column: "NM".into(),
            related: "Menu".into(),
            related_table: "SYSTEM_MENU".into(),
            related_pk: "MENU_CD".into(),
            expand: vec!["MENU_NM".into()],
        }
    }

    #[test]
    fn list_with_join_filters_and_paging() {
        let e = entity_fixture("Auth", "SYSTEM_AUTH", None, true);
        let rel = relation();
        let q = select_list(
            EngineKind::Sqlite,
            &e,
            &[&rel],
            &[("NM".into(), BindValue::text("x")), ("NOPE".into(), BindValue::text("y"))],
            Some(5000),
            None,
        );
        assert_eq!(
            q.columns,
            "\"t0\".\"ID\" AS \"ID\", \"t0\".\"NM\" AS \"NM\", \"t0\".\"ORDER\" AS \"ORDER\", \"j1\".\"MENU_NM\" AS \"menu__MENU_NM\""
        );
        assert_eq!(
            q.from,
            "\"SYSTEM_AUTH\" AS \"t0\" LEFT JOIN \"SYSTEM_MENU\" AS \"j1\" ON \"j1\".\"MENU_CD\" = \"t0\".\"NM\""
        );
        assert_eq!(q.tail, " WHERE \"t0\".\"NM\" = $1 ORDER BY \"t0\".\"ID\" LIMIT 1000 OFFSET 0");
        assert_eq!(q.params, vec![BindValue::text("x")]);
    }

    #[test]
    fn ordering_from_config() {
        let mut e = entity_fixture("Menu", "SYSTEM_MENU", None, true);
        e.ordering = vec![("ORDER".into(), false), ("NM".into(), true)];
        let q = select_list(EngineKind::Postgres, &e, &[], &[], None, Some(10));
        assert_eq!(q.tail, " ORDER BY \"t0\".\"ORDER\", \"t0\".\"NM\" DESC LIMIT 100 OFFSET 10");
    }

    #[test]
    fn mysql_uses_backticks_and_question_marks() {
        let e = entity_fixture("Menu", "SYSTEM_MENU", None, true);
        let q = select_by_id(EngineKind::Mysql, &e, &[], BindValue::text("M1"));
        assert_eq!(q.assemble(&q.from).sql, "SELECT `t0`.`ID` AS `ID`, `t0`.`NM` AS `NM`, `t0`.`ORDER` AS `ORDER` FROM `SYSTEM_MENU` AS `t0` WHERE `t0`.`ID` = ?");
    }

    #[test]
    fn insert_returns_row_where_supported() {
        let e = entity_fixture("Menu", "SYSTEM_MENU", None, true);
        let values = vec![("ID".to_string(), BindValue::text("M1")), ("ORDER".to_string(), BindValue::I64(3))];
        let q = insert(EngineKind::Sqlite, &e, &values);
        assert_eq!(
            q.sql,
            "INSERT INTO \"SYSTEM_MENU\" (\"ID\", \"ORDER\") VALUES ($1, $2) RETURNING \"ID\", \"NM\", \"ORDER\""
        );
        let q = insert(EngineKind::Mysql, &e, &values);
        assert_eq!(q.sql, "INSERT INTO `SYSTEM_MENU` (`ID`, `ORDER`) VALUES (?, ?)");
    }

    #[test]
    fn update_skips_pk_and_binds_id_last() {
        let e = entity_fixture("Menu", "SYSTEM_MENU", None, true);
        let q = update(
            EngineKind::Postgres,
            &e,
            BindValue::text("M1"),
            &[("ID".into(), BindValue::text("M2")), ("NM".into(), BindValue::Null(ValueKind::Text))],
        )
        .expect("update");
        assert_eq!(q.sql, "UPDATE \"SYSTEM_MENU\" SET \"NM\" = $1 WHERE \"ID\" = $2");
        assert_eq!(q.params, vec![BindValue::Null(ValueKind::Text), BindValue::text("M1")]);
        assert!(update(EngineKind::Postgres, &e, BindValue::text("M1"), &[]).is_none());
    }

    #[test]
    fn count_shares_filters() {
        let e = entity_fixture("Menu", "SYSTEM_MENU", None, true);
        let q = count(EngineKind::Sqlite, &e, &[("NM".into(), BindValue::text("a"))]);
        assert_eq!(
            q.assemble(&q.from).sql,
            "SELECT COUNT(*) AS \"count\" FROM \"SYSTEM_MENU\" AS \"t0\" WHERE \"t0\".\"NM\" = $1"
        );
    }
}
