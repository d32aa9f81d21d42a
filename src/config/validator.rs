//! Config validation: referential integrity and API consistency.

use crate::config::AppConfig;
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_ALIAS: &str = "default";

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let mut aliases = HashSet::new();
    for db in &config.databases {
        if !aliases.insert(db.alias.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate database alias: {}", db.alias)));
        }
    }
    if !aliases.contains(DEFAULT_ALIAS) {
        return Err(ConfigError::Validation(format!(
            "a database with alias '{}' is required",
            DEFAULT_ALIAS
        )));
    }

    let columns_by_model: HashMap<&str, HashSet<&str>> = config
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.columns.iter().map(|c| c.name.as_str()).collect()))
        .collect();

    let mut path_segments = HashSet::new();
    let mut names = HashSet::new();
    for e in &config.entities {
        if !path_segments.insert(e.path.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(e.path.clone()));
        }
        if !names.insert(e.name.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate entity name: {}", e.name)));
        }
        if let Some(alias) = &e.db_alias {
            if !aliases.contains(alias.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "database",
                    id: alias.clone(),
                });
            }
        }
        let own = &columns_by_model[e.name.as_str()];
        if !own.contains(e.primary_key.as_str()) {
            return Err(ConfigError::InvalidPrimaryKey {
                entity: e.name.clone(),
                column: e.primary_key.clone(),
            });
        }
        let referenced = e
            .key_from
            .iter()
            .chain(e.unique_together.iter().flatten())
            .chain(e.sensitive_columns.iter())
            .chain(e.hashed_columns.iter())
            .chain(e.validation.keys())
            .map(String::as_str)
            .chain(e.ordering.iter().map(|o| o.trim_start_matches('-')));
        for col in referenced {
            if !own.contains(col) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.name, col),
                });
            }
        }
        for rel in &e.relations {
            if !own.contains(rel.column.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", e.name, rel.column),
                });
            }
            let related = columns_by_model
                .get(rel.model.as_str())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "model",
                    id: rel.model.clone(),
                })?;
            for col in &rel.expand {
                if !related.contains(col.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "column",
                        id: format!("{}.{}", rel.model, col),
                    });
                }
            }
        }
    }

    Ok(())
}
