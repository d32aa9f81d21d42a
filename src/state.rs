//! Shared application state for all routes. Everything is immutable after bootstrap.

use crate::auth::JwtKeys;
use crate::config::{ResolvedModel, SecurityConfig};
use crate::db::{ConnectionRouter, Databases};
use crate::sql::SqlCompiler;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub databases: Arc<Databases>,
    pub model: Arc<ResolvedModel>,
    pub router: Arc<ConnectionRouter>,
    pub compiler: Arc<SqlCompiler>,
    pub jwt: Arc<JwtKeys>,
    pub security: Arc<SecurityConfig>,
}
