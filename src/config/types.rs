//! Raw config types matching the JSON document (databases, security, entity catalog).

use crate::db::EngineKind;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Whole configuration document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Declaration order is scan order.
    pub databases: Vec<DatabaseConfig>,
    /// Cross-database join mode: reads funnel through `default`, table names are qualified.
    #[serde(default)]
    pub multi_join: bool,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub alias: String,
    pub engine: EngineKind,
    pub url: String,
    /// Physical database name. For SQLite this is the file path attached under the alias.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expiry_minutes")]
    pub jwt_expiry_minutes: i64,
    #[serde(default = "default_refresh_expiry_days")]
    pub refresh_expiry_days: i64,
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
    #[serde(default = "default_user_entity")]
    pub user_entity: String,
    #[serde(default = "default_token_entity")]
    pub token_entity: String,
    #[serde(default)]
    pub admin: Option<AdminConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            jwt_secret: default_jwt_secret(),
            jwt_expiry_minutes: default_jwt_expiry_minutes(),
            refresh_expiry_days: default_refresh_expiry_days(),
            password_iterations: default_password_iterations(),
            user_entity: default_user_entity(),
            token_entity: default_token_entity(),
            admin: None,
        }
    }
}

fn default_jwt_secret() -> String {
    "change-me".into()
}

fn default_jwt_expiry_minutes() -> i64 {
    300
}

fn default_refresh_expiry_days() -> i64 {
    7
}

fn default_password_iterations() -> u32 {
    260_000
}

fn default_user_entity() -> String {
    "users".into()
}

fn default_token_entity() -> String {
    "user_tokens".into()
}

/// Superuser seeded at bootstrap when absent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(String),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig::Literal(s)),
            serde_json::Value::Number(n) => Ok(ColumnDefaultConfig::Expression {
                expression: n.to_string(),
            }),
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a string, a number, or {{ \"expression\": \"...\" }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be a string, a number, or {{ \"expression\": \"...\" }}; got {}",
                type_name_of_json(&other)
            ))),
        }
    }
}

fn type_name_of_json(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
}

fn default_true() -> bool {
    true
}

/// To-one relation: `column` holds the primary key of `model`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    pub column: String,
    pub model: String,
    /// Related columns flattened into list/read output as `{name}__{column}`.
    #[serde(default)]
    pub expand: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub app: String,
    pub name: String,
    pub table: String,
    pub path: String,
    /// Explicit owning alias; absent means "wherever the scan finds it".
    #[serde(default)]
    pub db_alias: Option<String>,
    #[serde(default = "default_true")]
    pub managed: bool,
    pub primary_key: String,
    /// Columns joined with `/` to derive the primary key when the body omits it.
    #[serde(default)]
    pub key_from: Vec<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub unique_together: Vec<Vec<String>>,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default = "default_operations")]
    pub operations: Vec<String>,
    /// Column names; a leading `-` sorts descending.
    #[serde(default)]
    pub ordering: Vec<String>,
    /// Column names that must never be exposed in API responses.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
    /// Column names stored as password hashes.
    #[serde(default)]
    pub hashed_columns: Vec<String>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default = "default_true")]
    pub audit: bool,
}

fn default_operations() -> Vec<String> {
    ["list", "read", "create", "update", "delete"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
