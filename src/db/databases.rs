//! Connection registry: one `AnyPool` per configured alias, in declaration order.

use crate::config::DatabaseConfig;
use crate::db::EngineKind;
use crate::error::{AppError, ConfigError};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::collections::HashMap;
use std::sync::Arc;

pub struct Database {
    pub alias: String,
    pub engine: EngineKind,
    /// Physical database name (SQLite: file path).
    pub name: Option<String>,
    pub pool: AnyPool,
}

#[derive(Default)]
pub struct Databases {
    entries: Vec<Database>,
}

impl Databases {
    /// Connect every alias. In join mode each SQLite connection attaches every SQLite database
    /// under its alias, so `"alias"."table"` resolves on any of them.
    pub async fn connect(configs: &[DatabaseConfig], multi_join: bool) -> Result<Self, AppError> {
        sqlx::any::install_default_drivers();
        let attach = if multi_join {
            Arc::new(attach_statements(configs)?)
        } else {
            Arc::new(Vec::new())
        };

        let mut entries = Vec::with_capacity(configs.len());
        for cfg in configs {
            if cfg.engine == EngineKind::SqlServer {
                return Err(ConfigError::UnsupportedEngine {
                    alias: cfg.alias.clone(),
                    engine: cfg.engine.as_str().to_string(),
                }
                .into());
            }
            let mut options = AnyPoolOptions::new().max_connections(cfg.max_connections.unwrap_or(5));
            if cfg.engine == EngineKind::Sqlite && !attach.is_empty() {
                let attach = attach.clone();
                options = options.after_connect(move |conn, _meta| {
                    let statements = attach.clone();
                    Box::pin(async move {
                        for sql in statements.iter() {
                            sqlx::query(sql.as_str()).execute(&mut *conn).await?;
                        }
                        Ok(())
                    })
                });
            }
            let pool = options.connect(&cfg.url).await?;
            tracing::info!(alias = %cfg.alias, engine = cfg.engine.as_str(), "database connected");
            entries.push(Database {
                alias: cfg.alias.clone(),
                engine: cfg.engine,
                name: cfg.name.clone(),
                pool,
            });
        }
        Ok(Databases { entries })
    }

    pub fn get(&self, alias: &str) -> Result<&Database, AppError> {
        self.entries
            .iter()
            .find(|d| d.alias == alias)
            .ok_or_else(|| {
                ConfigError::MissingReference {
                    kind: "database",
                    id: alias.to_string(),
                }
                .into()
            })
    }

    pub fn engine(&self, alias: &str) -> Result<EngineKind, AppError> {
        Ok(self.get(alias)?.engine)
    }

    pub fn entries(&self) -> &[Database] {
        &self.entries
    }

    /// alias -> physical name, for aliases that declare one.
    pub fn physical_names(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .filter_map(|d| d.name.clone().map(|n| (d.alias.clone(), n)))
            .collect()
    }

    pub async fn close(&self) {
        for db in &self.entries {
            db.pool.close().await;
        }
    }
}

fn attach_statements(configs: &[DatabaseConfig]) -> Result<Vec<String>, ConfigError> {
    configs
        .iter()
        .filter(|c| c.engine == EngineKind::Sqlite)
        .map(|c| {
            let path = c.name.as_ref().ok_or_else(|| ConfigError::MissingPhysicalName {
                alias: c.alias.clone(),
            })?;
            Ok(format!(
                "ATTACH DATABASE '{}' AS {}",
                path.replace('\'', "''"),
                EngineKind::Sqlite.quote_name(&c.alias)
            ))
        })
        .collect()
}
