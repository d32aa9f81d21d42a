//! Schema creation: CREATE TABLE IF NOT EXISTS for every managed entity on the alias that owns it,
//! plus a bookkeeping table on `default`.

use crate::config::types::{AppConfig, ColumnDefaultConfig, EntityConfig};
use crate::config::{ResolvedModel, AUDIT_COLUMNS, DEFAULT_ALIAS};
use crate::db::{ConnectionRouter, Database, Databases, EngineKind};
use crate::error::AppError;
use std::collections::HashSet;

pub const MIGRATIONS_TABLE: &str = "_migrations";
const CORE_APP: &str = "core";

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn render_default(default: &ColumnDefaultConfig) -> String {
    match default {
        ColumnDefaultConfig::Literal(s) => literal(s),
        ColumnDefaultConfig::Expression { expression } => expression.clone(),
    }
}

/// DDL for one entity, audit columns included.
pub fn create_table_sql(engine: EngineKind, entity: &EntityConfig) -> String {
    let q = |s: &str| engine.quote_name(s);
    let mut defs: Vec<String> = Vec::new();
    for c in &entity.columns {
        let mut def = format!("{} {}", q(&c.name), c.type_);
        if !c.nullable || c.name == entity.primary_key {
            def.push_str(" NOT NULL");
        }
        if let Some(d) = &c.default {
            def.push_str(" DEFAULT ");
            def.push_str(&render_default(d));
        }
        defs.push(def);
    }
    if entity.audit {
        let declared: HashSet<&str> = entity.columns.iter().map(|c| c.name.as_str()).collect();
        for (name, sql_type, nullable, default) in AUDIT_COLUMNS {
            if declared.contains(name) {
                continue;
            }
            let mut def = format!("{} {}", q(name), sql_type);
            if !nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(d) = default {
                def.push_str(" DEFAULT ");
                def.push_str(d);
            }
            defs.push(def);
        }
    }
    defs.push(format!("PRIMARY KEY ({})", q(&entity.primary_key)));
    for c in entity.columns.iter().filter(|c| c.unique && c.name != entity.primary_key) {
        defs.push(format!("UNIQUE ({})", q(&c.name)));
    }
    for group in &entity.unique_together {
        let cols: Vec<String> = group.iter().map(|c| q(c)).collect();
        defs.push(format!("UNIQUE ({})", cols.join(", ")));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", q(&entity.table), defs.join(", "))
}

fn bookkeeping_sql(engine: EngineKind) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(200) NOT NULL, {} VARCHAR(40), PRIMARY KEY ({}))",
        engine.quote_name(MIGRATIONS_TABLE),
        engine.quote_name("name"),
        engine.quote_name("applied_at"),
        engine.quote_name("name")
    )
}

/// Ensure every table exists where the router allows it. Returns the `app.Entity` names applied.
pub async fn apply_migrations(
    databases: &Databases,
    router: &ConnectionRouter,
    config: &AppConfig,
    model: &ResolvedModel,
) -> Result<Vec<String>, AppError> {
    let mut applied = Vec::new();
    for db in databases.entries() {
        if router.allow_migrate(&db.alias, CORE_APP, None) {
            sqlx::query(&bookkeeping_sql(db.engine)).execute(&db.pool).await?;
        }
        for entity in &config.entities {
            let Some(resolved) = model.entity_by_name(&entity.name) else {
                continue;
            };
            if !router.allow_migrate(&db.alias, &entity.app, Some(resolved)) {
                continue;
            }
            let ddl = create_table_sql(db.engine, entity);
            tracing::debug!(alias = %db.alias, sql = %ddl, "migration");
            sqlx::query(&ddl).execute(&db.pool).await?;
            tracing::info!(alias = %db.alias, table = %entity.table, "table ensured");
            applied.push(format!("{}.{}", entity.app, entity.name));
        }
    }
    if let Ok(default) = databases.get(DEFAULT_ALIAS) {
        record(default, &applied).await?;
    }
    Ok(applied)
}

async fn record(db: &Database, names: &[String]) -> Result<(), AppError> {
    let table = db.engine.quote_name(MIGRATIONS_TABLE);
    let name_col = db.engine.quote_name("name");
    let exists = format!("SELECT {} FROM {} WHERE {} = {}", name_col, table, name_col, db.engine.placeholder(1));
    let insert = format!(
        "INSERT INTO {} ({}, {}) VALUES ({}, {})",
        table,
        name_col,
        db.engine.quote_name("applied_at"),
        db.engine.placeholder(1),
        db.engine.placeholder(2)
    );
    let now = chrono::Utc::now().to_rfc3339();
    for name in names {
        let seen = sqlx::query(&exists).bind(name.as_str()).fetch_optional(&db.pool).await?;
        if seen.is_none() {
            sqlx::query(&insert)
                .bind(name.as_str())
                .bind(now.as_str())
                .execute(&db.pool)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::ColumnConfig;

    fn column(name: &str, type_: &str, nullable: bool) -> ColumnConfig {
        ColumnConfig {
            name: name.into(),
            type_: type_.into(),
            nullable,
            unique: false,
            default: None,
        }
    }

    fn entity(audit: bool) -> EntityConfig {
        let mut use_yn = column("USE_YN", "VARCHAR(1)", false);
        use_yn.default = Some(ColumnDefaultConfig::Literal("Y".into()));
        let mut email = column("EMAIL", "VARCHAR(50)", true);
        email.unique = true;
        serde_json::from_value::<EntityConfig>(serde_json::json!({
            "app": "system",
            "name": "Menu",
            "table": "SYSTEM_MENU",
            "path": "menus",
            "primary_key": "MENU_CD",
            "columns": [],
            "unique_together": [["MENU_CD", "USE_YN"]],
            "audit": audit
        }))
        .map(|mut e| {
            e.columns = vec![column("MENU_CD", "VARCHAR(20)", true), use_yn, email];
            e
        })
        .expect("entity")
    }

    #[test]
    fn ddl_without_audit() {
        assert_eq!(
            create_table_sql(EngineKind::Sqlite, &entity(false)),
            "CREATE TABLE IF NOT EXISTS \"SYSTEM_MENU\" (\"MENU_CD\" VARCHAR(20) NOT NULL, \"USE_YN\" VARCHAR(1) NOT NULL DEFAULT 'Y', \"EMAIL\" VARCHAR(50), PRIMARY KEY (\"MENU_CD\"), UNIQUE (\"EMAIL\"), UNIQUE (\"MENU_CD\", \"USE_YN\"))"
        );
    }

    #[test]
    fn audit_columns_appended() {
        let ddl = create_table_sql(EngineKind::Mysql, &entity(true));
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS `SYSTEM_MENU`"));
        assert!(ddl.contains("`INS_USER_ID` VARCHAR(20) NOT NULL DEFAULT 'dev'"));
        assert!(ddl.contains("`UPD_DT` VARCHAR(40), PRIMARY KEY"));
    }

    #[test]
    fn bookkeeping_table() {
        assert_eq!(
            bookkeeping_sql(EngineKind::Postgres),
            "CREATE TABLE IF NOT EXISTS \"_migrations\" (\"name\" VARCHAR(200) NOT NULL, \"applied_at\" VARCHAR(40), PRIMARY KEY (\"name\"))"
        );
    }
}
