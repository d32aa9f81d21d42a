//! Startup schema scan: which tables live on which alias, and their qualified names.

use crate::config::ResolvedModel;
use crate::db::{Database, EngineKind};
use crate::error::{AppError, ConfigError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Immutable result of the scan.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    /// quoted bare name -> qualified name, in scan order.
    qualified: Vec<(String, String)>,
    exact: HashMap<String, usize>,
    /// Lowercased quoted name -> first entry with that spelling.
    folded: HashMap<String, usize>,
    owners: HashMap<String, String>,
}

impl SchemaCatalog {
    /// Record one scanned table. A repeated name keeps its position and takes the new values.
    pub fn insert(&mut self, table: &str, alias: &str, quoted: String, qualified: String) {
        self.owners.insert(table.to_string(), alias.to_string());
        match self.exact.get(&quoted) {
            Some(&i) => self.qualified[i].1 = qualified,
            None => {
                let i = self.qualified.len();
                self.exact.insert(quoted.clone(), i);
                self.folded.entry(quoted.to_lowercase()).or_insert(i);
                self.qualified.push((quoted, qualified));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.qualified.is_empty()
    }

    pub fn len(&self) -> usize {
        self.qualified.len()
    }

    /// Owning alias of a bare table name.
    pub fn owner(&self, table: &str) -> Option<&str> {
        self.owners.get(table).map(String::as_str)
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.owners.keys().any(|t| t.eq_ignore_ascii_case(table))
    }

    /// Qualified form of a quoted table name, matched case-insensitively.
    pub fn qualified(&self, quoted: &str) -> Option<&str> {
        let i = self
            .exact
            .get(quoted)
            .or_else(|| self.folded.get(&quoted.to_lowercase()))?;
        Some(self.qualified[*i].1.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.qualified.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A connection whose catalog can be listed.
#[async_trait]
pub trait Introspect: Send + Sync {
    fn alias(&self) -> &str;
    fn engine(&self) -> EngineKind;
    /// Run a catalog query whose first column is a name.
    async fn fetch_names(&self, sql: &str) -> Result<Vec<String>, AppError>;
}

#[async_trait]
impl Introspect for Database {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn engine(&self) -> EngineKind {
        self.engine
    }

    async fn fetch_names(&self, sql: &str) -> Result<Vec<String>, AppError> {
        tracing::debug!(alias = %self.alias, sql = %sql, "catalog query");
        let names = sqlx::query_scalar::<_, String>(sql).fetch_all(&self.pool).await?;
        Ok(names)
    }
}

/// Scan every source in order and build the catalog. The last scanned owner of a name wins.
pub async fn scan<I: Introspect>(
    sources: &[I],
    model: &ResolvedModel,
    physical_names: &HashMap<String, String>,
) -> Result<SchemaCatalog, AppError> {
    let declared: HashMap<&str, &str> = model
        .entities
        .iter()
        .filter_map(|e| e.db_alias.as_deref().map(|a| (e.table_name.as_str(), a)))
        .collect();

    let mut catalog = SchemaCatalog::default();
    for source in sources {
        let engine = source.engine();
        let mut names = source.fetch_names(engine.table_list_query()).await?;
        if let Some(sql) = engine.view_catalog_query() {
            names.extend(source.fetch_names(sql).await?);
        }
        for table in &names {
            let alias = declared.get(table.as_str()).copied().unwrap_or(source.alias());
            let db_name = if engine.is_file_based() {
                alias.to_string()
            } else {
                physical_names
                    .get(alias)
                    .cloned()
                    .ok_or_else(|| ConfigError::MissingPhysicalName {
                        alias: alias.to_string(),
                    })?
            };
            catalog.insert(table, alias, engine.quote_name(table), engine.qualify(&db_name, table));
        }
        tracing::info!(alias = %source.alias(), tables = names.len(), "schema scanned");
    }
    Ok(catalog)
}

/// Holds the published catalog. The first successful scan wins; later triggers return it unchanged.
#[derive(Default)]
pub struct CatalogSlot {
    inner: OnceLock<Arc<SchemaCatalog>>,
}

impl CatalogSlot {
    pub fn get(&self) -> Option<Arc<SchemaCatalog>> {
        self.inner.get().cloned()
    }

    pub async fn scan_once<I: Introspect>(
        &self,
        sources: &[I],
        model: &ResolvedModel,
        physical_names: &HashMap<String, String>,
    ) -> Result<Arc<SchemaCatalog>, AppError> {
        if let Some(existing) = self.inner.get() {
            tracing::debug!("schema catalog already published");
            return Ok(existing.clone());
        }
        let catalog = Arc::new(scan(sources, model, physical_names).await?);
        Ok(self.inner.get_or_init(|| catalog).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolved::entity_fixture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeConnection {
        alias: &'static str,
        engine: EngineKind,
        tables: Vec<&'static str>,
        views: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeConnection {
        fn new(alias: &'static str, engine: EngineKind, tables: Vec<&'static str>) -> Self {
            FakeConnection {
                alias,
                engine,
                tables,
                views: Vec::new(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Introspect for FakeConnection {
        fn alias(&self) -> &str {
            self.alias
        }

        fn engine(&self) -> EngineKind {
            self.engine
        }

        async fn fetch_names(&self, sql: &str) -> Result<Vec<String>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let names = if sql.contains("sysobjects") { &self.views } else { &self.tables };
            Ok(names.iter().map(|s| s.to_string()).collect())
        }
    }

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(a, n)| (a.to_string(), n.to_string())).collect()
    }

    #[tokio::test]
    async fn sqlite_tables_qualify_by_alias() {
        let sources = vec![
            FakeConnection::new("default", EngineKind::Sqlite, vec!["SYSTEM_USER"]),
            FakeConnection::new("system", EngineKind::Sqlite, vec!["SYSTEM_MENU"]),
        ];
        let catalog = scan(&sources, &ResolvedModel::default(), &HashMap::new()).await.expect("scan");
        assert_eq!(catalog.qualified("\"SYSTEM_USER\""), Some("\"default\".\"SYSTEM_USER\""));
        assert_eq!(catalog.qualified("\"SYSTEM_MENU\""), Some("\"system\".\"SYSTEM_MENU\""));
        assert_eq!(catalog.owner("SYSTEM_MENU"), Some("system"));
        assert_eq!(catalog.qualified("\"system_menu\""), Some("\"system\".\"SYSTEM_MENU\""));
    }

    #[tokio::test]
    async fn server_engines_use_physical_names_and_views() {
        let mut mssql = FakeConnection::new("erp", EngineKind::SqlServer, vec!["ORDERS"]);
        mssql.views = vec!["V_ORDERS"];
        let sources = vec![mssql];
        let catalog = scan(&sources, &ResolvedModel::default(), &names(&[("erp", "ERP_DB")]))
            .await
            .expect("scan");
        assert_eq!(catalog.qualified("[ORDERS]"), Some("[ERP_DB].[dbo].[ORDERS]"));
        assert_eq!(catalog.qualified("[V_ORDERS]"), Some("[ERP_DB].[dbo].[V_ORDERS]"));
        assert_eq!(catalog.len(), 2);
    }

    #[tokio::test]
    async fn missing_physical_name_fails() {
        let sources = vec![FakeConnection::new("erp", EngineKind::Postgres, vec!["ORDERS"])];
        let err = scan(&sources, &ResolvedModel::default(), &HashMap::new()).await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingPhysicalName { ref alias }) if alias == "erp"));
    }

    #[tokio::test]
    async fn explicit_alias_overrides_and_last_scan_wins() {
        let model = ResolvedModel::new(vec![entity_fixture("Menu", "SYSTEM_MENU", Some("system"), true)]);
        let sources = vec![
            FakeConnection::new("default", EngineKind::Sqlite, vec!["SYSTEM_MENU", "SHARED"]),
            FakeConnection::new("archive", EngineKind::Sqlite, vec!["SHARED"]),
        ];
        let catalog = scan(&sources, &model, &HashMap::new()).await.expect("scan");
        assert_eq!(catalog.owner("SYSTEM_MENU"), Some("system"));
        assert_eq!(catalog.qualified("\"SYSTEM_MENU\""), Some("\"system\".\"SYSTEM_MENU\""));
        assert_eq!(catalog.owner("SHARED"), Some("archive"));
        assert_eq!(catalog.qualified("\"SHARED\""), Some("\"archive\".\"SHARED\""));
        let order: Vec<&str> = catalog.entries().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["\"SYSTEM_MENU\"", "\"SHARED\""]);
    }

    #[tokio::test]
    async fn second_trigger_is_a_no_op() {
        let sources = vec![FakeConnection::new("default", EngineKind::Sqlite, vec!["SYSTEM_USER"])];
        let slot = CatalogSlot::default();
        let first = slot.scan_once(&sources, &ResolvedModel::default(), &HashMap::new()).await.expect("scan");
        let second = slot.scan_once(&sources, &ResolvedModel::default(), &HashMap::new()).await.expect("scan");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(sources[0].calls.load(Ordering::SeqCst), 1);
    }
}
