//! Load config from a JSON document and resolve it into the runtime model.

use crate::config::resolved::{ColumnInfo, RelationSpec, ResolvedEntity, ResolvedModel, ValueKind};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::collections::HashSet;
use std::path::Path;

/// Audit columns appended to audited entities: (name, type, nullable, DDL default).
pub const AUDIT_COLUMNS: [(&str, &str, bool, Option<&str>); 6] = [
    ("INS_USER_ID", "VARCHAR(20)", false, Some("'dev'")),
    ("INS_USER_IP", "VARCHAR(40)", false, Some("'127.0.0.1'")),
    ("INS_DT", "VARCHAR(40)", true, None),
    ("UPD_USER_ID", "VARCHAR(20)", false, Some("''")),
    ("UPD_USER_IP", "VARCHAR(40)", false, Some("''")),
    ("UPD_DT", "VARCHAR(40)", true, None),
];

/// Read the JSON config document at `path`.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Environment overrides: `JWT_SECRET`, `DB_MULTI_JOIN`.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        if !secret.is_empty() {
            config.security.jwt_secret = secret;
        }
    }
    if let Ok(flag) = std::env::var("DB_MULTI_JOIN") {
        config.multi_join = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
    }
}

/// Build resolved model from config (validates first).
pub fn resolve(config: &AppConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut entities = Vec::with_capacity(config.entities.len());
    for e in &config.entities {
        let mut columns: Vec<ColumnInfo> = e
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                sql_type: c.type_.clone(),
                kind: ValueKind::from_sql_type(&c.type_),
                nullable: c.nullable,
                has_default: c.default.is_some(),
                unique: c.unique,
                max_length: declared_length(&c.type_),
            })
            .collect();

        if e.audit {
            let config_col_names: HashSet<&str> = e.columns.iter().map(|c| c.name.as_str()).collect();
            for (name, sql_type, nullable, default) in AUDIT_COLUMNS {
                if !config_col_names.contains(name) {
                    columns.push(ColumnInfo {
                        name: name.to_string(),
                        sql_type: sql_type.to_string(),
                        kind: ValueKind::Text,
                        nullable,
                        has_default: default.is_some(),
                        unique: false,
                        max_length: declared_length(sql_type),
                    });
                }
            }
        }

        let pk_kind = columns
            .iter()
            .find(|c| c.name == e.primary_key)
            .map(|c| c.kind)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                entity: e.name.clone(),
                column: e.primary_key.clone(),
            })?;

        let mut relations = Vec::with_capacity(e.relations.len());
        for rel in &e.relations {
            let related = config
                .entities
                .iter()
                .find(|r| r.name == rel.model)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: rel.model.clone(),
                })?;
            relations.push(RelationSpec {
                name: rel.name.clone(),
                column: rel.column.clone(),
                related: related.name.clone(),
                related_table: related.table.clone(),
                related_pk: related.primary_key.clone(),
                expand: rel.expand.clone(),
            });
        }

        let ordering = e
            .ordering
            .iter()
            .map(|o| match o.strip_prefix('-') {
                Some(col) => (col.to_string(), true),
                None => (o.clone(), false),
            })
            .collect();

        entities.push(ResolvedEntity {
            app: e.app.clone(),
            name: e.name.clone(),
            table_name: e.table.clone(),
            path_segment: e.path.clone(),
            db_alias: e.db_alias.clone(),
            managed: e.managed,
            pk_column: e.primary_key.clone(),
            pk_kind,
            key_from: e.key_from.clone(),
            columns,
            unique_together: e.unique_together.clone(),
            relations,
            operations: e.operations.clone(),
            ordering,
            sensitive_columns: e.sensitive_columns.iter().cloned().collect(),
            hashed_columns: e.hashed_columns.iter().cloned().collect(),
            validation: e.validation.clone(),
            audit: e.audit,
        });
    }

    Ok(ResolvedModel::new(entities))
}

fn declared_length(sql_type: &str) -> Option<u32> {
    let lower = sql_type.to_lowercase();
    if !(lower.starts_with("varchar") || lower.starts_with("char") || lower.starts_with("nvarchar")) {
        return None;
    }
    let open = lower.find('(')?;
    let close = lower.find(')')?;
    lower.get(open + 1..close)?.trim().parse().ok()
}
