//! Statement compilation: applies cross-database table qualification in join mode.

use crate::db::{SchemaCatalog, SqlRewriter};
use crate::sql::{QueryBuf, SelectQuery};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Aggregate,
}

/// Outside join mode every statement passes through untouched.
pub struct SqlCompiler {
    rewriter: Option<SqlRewriter>,
}

impl SqlCompiler {
    pub fn passthrough() -> Self {
        SqlCompiler { rewriter: None }
    }

    pub fn for_mode(catalog: Arc<SchemaCatalog>, multi_join: bool) -> Self {
        if multi_join {
            SqlCompiler {
                rewriter: Some(SqlRewriter::new(catalog)),
            }
        } else {
            Self::passthrough()
        }
    }

    pub fn rewrites(&self) -> bool {
        self.rewriter.is_some()
    }

    /// Selects and aggregates only have their FROM clause (joins included) rewritten, so
    /// column aliases that collide with table names stay intact.
    pub fn select(&self, q: &SelectQuery) -> QueryBuf {
        match &self.rewriter {
            Some(r) => q.assemble(&r.rewrite(&q.from)),
            None => q.assemble(&q.from),
        }
    }

    /// Inserts, updates and deletes are rewritten whole. Parameters are never touched.
    pub fn statement(&self, kind: QueryKind, q: QueryBuf) -> QueryBuf {
        let Some(r) = &self.rewriter else {
            return q;
        };
        let sql = r.rewrite(&q.sql).into_owned();
        tracing::trace!(kind = ?kind, sql = %sql, "statement compiled");
        QueryBuf { sql, params: q.params }
    }
}
