//! Crossdb Admin: configuration-driven admin REST backend spanning several databases,
//! with table-name rewriting for cross-database joins and atomic batch requests.

pub mod auth;
pub mod batch;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use batch::{BatchExecutor, BatchOption, BatchResult, RouterDispatcher};
pub use bootstrap::{initialize, App};
pub use config::{apply_env_overrides, load_from_path, resolve, AppConfig, ResolvedEntity, ResolvedModel};
pub use db::{ConnectionRouter, Databases, SchemaCatalog, Session, SqlRewriter};
pub use error::{AppError, ConfigError};
pub use middleware::with_method_override;
pub use migration::apply_migrations;
pub use routes::{api_router, build_app};
pub use service::CrudService;
pub use state::AppState;
