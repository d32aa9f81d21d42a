//! Per-engine SQL dialect rules: identifier quoting, placeholders, qualification, catalog queries.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Sqlite,
    Postgres,
    Mysql,
    SqlServer,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Sqlite => "sqlite",
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "mysql",
            EngineKind::SqlServer => "sqlserver",
        }
    }

    /// Quote an identifier (identifiers come from config or catalogs only).
    pub fn quote_name(self, ident: &str) -> String {
        match self {
            EngineKind::Sqlite | EngineKind::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
            EngineKind::Mysql => format!("`{}`", ident.replace('`', "``")),
            EngineKind::SqlServer => format!("[{}]", ident.replace(']', "]]")),
        }
    }

    /// Bind placeholder for the 1-based parameter `n`.
    pub fn placeholder(self, n: usize) -> String {
        match self {
            EngineKind::Sqlite | EngineKind::Postgres => format!("${}", n),
            EngineKind::Mysql => "?".to_string(),
            EngineKind::SqlServer => format!("@p{}", n),
        }
    }

    /// Embedded engines qualify tables by attach alias instead of a server-side database name.
    pub fn is_file_based(self) -> bool {
        matches!(self, EngineKind::Sqlite)
    }

    /// `db.table`, or `db.dbo.table` for SQL Server.
    pub fn qualify(self, db_name: &str, table: &str) -> String {
        match self {
            EngineKind::SqlServer => format!(
                "{}.{}.{}",
                self.quote_name(db_name),
                self.quote_name("dbo"),
                self.quote_name(table)
            ),
            _ => format!("{}.{}", self.quote_name(db_name), self.quote_name(table)),
        }
    }

    /// Native table listing; every row is one text column holding a table name.
    pub fn table_list_query(self) -> &'static str {
        match self {
            EngineKind::Sqlite => {
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
            EngineKind::Postgres => {
                "SELECT CAST(tablename AS TEXT) FROM pg_catalog.pg_tables WHERE schemaname = current_schema() ORDER BY tablename"
            }
            EngineKind::Mysql => {
                "SELECT CAST(table_name AS CHAR) FROM information_schema.tables WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' ORDER BY table_name"
            }
            EngineKind::SqlServer => "SELECT name FROM sys.tables ORDER BY name",
        }
    }

    /// View listing for engines whose metadata facility omits views. Other engines contribute none.
    pub fn view_catalog_query(self) -> Option<&'static str> {
        match self {
            EngineKind::SqlServer => Some("SELECT name FROM sys.sysobjects WHERE xtype = 'V';"),
            _ => None,
        }
    }

    pub fn supports_returning(self) -> bool {
        matches!(self, EngineKind::Sqlite | EngineKind::Postgres)
    }

    /// Pagination suffix; callers always emit ORDER BY first.
    pub fn limit_offset(self, limit: u32, offset: u32) -> String {
        match self {
            EngineKind::SqlServer => format!(" OFFSET {} ROWS FETCH NEXT {} ROWS ONLY", offset, limit),
            _ => format!(" LIMIT {} OFFSET {}", limit, offset),
        }
    }
}
