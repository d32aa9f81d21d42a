//! Startup sequence: resolve config, connect, migrate, scan, publish routing, seed the admin.

use crate::auth::{JwtKeys, TokenStore};
use crate::config::{resolve, AppConfig, ResolvedModel};
use crate::db::{CatalogSlot, ConnectionRouter, Databases, SchemaCatalog, Session};
use crate::error::{AppError, ConfigError};
use crate::migration::apply_migrations;
use crate::routes::build_app;
use crate::sql::SqlCompiler;
use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

pub struct App {
    pub state: AppState,
    pub router: Router,
}

/// Bring the service up from a loaded config. Any failure here is fatal to startup.
pub async fn initialize(config: AppConfig) -> Result<App, AppError> {
    let model = resolve(&config)?;
    let databases = Arc::new(Databases::connect(&config.databases, config.multi_join).await?);

    let unscanned = ConnectionRouter::unscanned(config.multi_join);
    let applied = apply_migrations(&databases, &unscanned, &config, &model).await?;
    tracing::info!(entities = applied.len(), "migrations applied");

    let slot = CatalogSlot::default();
    let catalog = slot
        .scan_once(databases.entries(), &model, &databases.physical_names())
        .await?;
    tracing::info!(tables = catalog.len(), multi_join = config.multi_join, "schema catalog published");

    let router = unscanned.with_catalog(catalog.clone());
    check_relations(&router, &model)?;
    if config.multi_join {
        check_column_names(&catalog, &model)?;
    }

    let state = AppState {
        databases: databases.clone(),
        model: Arc::new(model),
        router: Arc::new(router),
        compiler: Arc::new(SqlCompiler::for_mode(catalog, config.multi_join)),
        jwt: Arc::new(JwtKeys::from_config(&config.security)),
        security: Arc::new(config.security.clone()),
    };

    if let Some(admin) = &config.security.admin {
        let session = Session::new(databases.clone());
        match TokenStore::new(&state, &session).ensure_admin(admin).await {
            Ok(_) => session.commit().await?,
            Err(e) => {
                session.rollback().await;
                return Err(e);
            }
        }
    }

    let router = build_app(state.clone());
    Ok(App { state, router })
}

/// Statements are rewritten whole in join mode, so a column named like a table would get qualified.
fn check_column_names(catalog: &SchemaCatalog, model: &ResolvedModel) -> Result<(), ConfigError> {
    for entity in &model.entities {
        if let Some(col) = entity.columns.iter().find(|c| catalog.contains_table(&c.name)) {
            return Err(ConfigError::Validation(format!(
                "column {}.{} has the same name as a table",
                entity.name, col.name
            )));
        }
    }
    Ok(())
}

fn check_relations(router: &ConnectionRouter, model: &ResolvedModel) -> Result<(), ConfigError> {
    for entity in &model.entities {
        for rel in &entity.relations {
            let related = model
                .entity_by_name(&rel.related)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: rel.related.clone(),
                })?;
            if !router.allow_relation(entity, related) {
                return Err(ConfigError::Validation(format!(
                    "relation {}.{} to {} is not allowed",
                    entity.name, rel.name, related.name
                )));
            }
        }
    }
    Ok(())
}
