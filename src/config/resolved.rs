//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::ValidationRule;
use std::collections::{HashMap, HashSet};

/// How a column's values travel through JSON, query strings and binds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Real,
    Text,
}

impl ValueKind {
    pub fn from_sql_type(sql_type: &str) -> Self {
        let lower = sql_type.to_lowercase();
        if lower.contains("int") || lower.contains("serial") {
            ValueKind::Integer
        } else if lower.contains("real") || lower.contains("floa") || lower.contains("doub") {
            ValueKind::Real
        } else {
            ValueKind::Text
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub kind: ValueKind,
    pub nullable: bool,
    /// Whether the column has a DB default.
    pub has_default: bool,
    pub unique: bool,
    /// Length bound taken from `VARCHAR(n)` / `CHAR(n)`.
    pub max_length: Option<u32>,
}

/// To-one relation resolved against the related entity.
#[derive(Clone, Debug)]
pub struct RelationSpec {
    pub name: String,
    pub column: String,
    /// Model name of the related entity.
    pub related: String,
    pub related_table: String,
    pub related_pk: String,
    pub expand: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub app: String,
    pub name: String,
    pub table_name: String,
    pub path_segment: String,
    /// Explicit owning alias from config, if any.
    pub db_alias: Option<String>,
    pub managed: bool,
    pub pk_column: String,
    pub pk_kind: ValueKind,
    pub key_from: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub unique_together: Vec<Vec<String>>,
    pub relations: Vec<RelationSpec>,
    pub operations: Vec<String>,
    /// `(column, descending)`; falls back to the primary key.
    pub ordering: Vec<(String, bool)>,
    /// Column names to strip from all API responses (sensitive data).
    pub sensitive_columns: HashSet<String>,
    pub hashed_columns: HashSet<String>,
    pub validation: HashMap<String, ValidationRule>,
    pub audit: bool,
}

impl ResolvedEntity {
    /// Declared owning alias used for migration decisions.
    pub fn declared_alias(&self) -> &str {
        self.db_alias.as_deref().unwrap_or(crate::config::DEFAULT_ALIAS)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn allows(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    by_path: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl ResolvedModel {
    pub fn new(entities: Vec<ResolvedEntity>) -> Self {
        let by_path = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path_segment.clone(), i))
            .collect();
        let by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        ResolvedModel {
            entities,
            by_path,
            by_name,
        }
    }

    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.by_path.get(path).map(|&i| &self.entities[i])
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&ResolvedEntity> {
        self.by_name.get(name).map(|&i| &self.entities[i])
    }
}

/// Minimal entity for unit tests of routing and SQL generation.
#[cfg(test)]
pub(crate) fn entity_fixture(name: &str, table: &str, db_alias: Option<&str>, managed: bool) -> ResolvedEntity {
    let column = |n: &str, t: &str| ColumnInfo {
        name: n.to_string(),
        sql_type: t.to_string(),
        kind: ValueKind::from_sql_type(t),
        nullable: true,
        has_default: false,
        unique: false,
        max_length: None,
    };
    ResolvedEntity {
        app: "system".into(),
        name: name.into(),
        table_name: table.into(),
        path_segment: table.to_lowercase(),
        db_alias: db_alias.map(String::from),
        managed,
        pk_column: "ID".into(),
        pk_kind: ValueKind::Text,
        key_from: Vec::new(),
        columns: vec![column("ID", "VARCHAR(20)"), column("NM", "VARCHAR(50)"), column("ORDER", "INTEGER")],
        unique_together: Vec::new(),
        relations: Vec::new(),
        operations: vec!["list".into(), "read".into()],
        ordering: Vec::new(),
        sensitive_columns: HashSet::new(),
        hashed_columns: HashSet::new(),
        validation: HashMap::new(),
        audit: false,
    }
}
