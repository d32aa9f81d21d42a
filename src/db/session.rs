//! Unit of work spanning every alias touched by one request (or one batch).

use crate::db::Databases;
use crate::error::AppError;
use crate::sql::{bind_all, QueryBuf};
use sqlx::any::{Any, AnyQueryResult, AnyRow};
use sqlx::Transaction;
use std::sync::Arc;
use tokio::sync::Mutex;

type OpenTransactions = Vec<(String, Transaction<'static, Any>)>;

/// Transactions are opened lazily, one per alias, and committed in the order they were opened.
/// Dropping a session without committing rolls everything back.
pub struct Session {
    databases: Arc<Databases>,
    open: Mutex<OpenTransactions>,
}

impl Session {
    pub fn new(databases: Arc<Databases>) -> Self {
        Session {
            databases,
            open: Mutex::new(Vec::new()),
        }
    }

    pub fn databases(&self) -> &Arc<Databases> {
        &self.databases
    }

    pub async fn fetch_all(&self, alias: &str, q: &QueryBuf) -> Result<Vec<AnyRow>, AppError> {
        let mut open = self.open.lock().await;
        let tx = transaction(&self.databases, &mut open, alias).await?;
        tracing::debug!(alias = %alias, sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query::<Any>(&q.sql), &q.params).fetch_all(&mut **tx).await?;
        Ok(rows)
    }

    pub async fn fetch_optional(&self, alias: &str, q: &QueryBuf) -> Result<Option<AnyRow>, AppError> {
        let mut open = self.open.lock().await;
        let tx = transaction(&self.databases, &mut open, alias).await?;
        tracing::debug!(alias = %alias, sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query::<Any>(&q.sql), &q.params)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(row)
    }

    pub async fn execute(&self, alias: &str, q: &QueryBuf) -> Result<AnyQueryResult, AppError> {
        let mut open = self.open.lock().await;
        let tx = transaction(&self.databases, &mut open, alias).await?;
        tracing::debug!(alias = %alias, sql = %q.sql, params = ?q.params, "execute");
        let done = bind_all(sqlx::query::<Any>(&q.sql), &q.params).execute(&mut **tx).await?;
        Ok(done)
    }

    /// Aliases with an open transaction, in open order.
    pub async fn open_aliases(&self) -> Vec<String> {
        self.open.lock().await.iter().map(|(a, _)| a.clone()).collect()
    }

    /// Commit in open order. There is no two-phase commit: a failure leaves earlier aliases
    /// committed and rolls back the rest.
    pub async fn commit(&self) -> Result<(), AppError> {
        let open: OpenTransactions = std::mem::take(&mut *self.open.lock().await);
        let mut pending = open.into_iter();
        while let Some((alias, tx)) = pending.next() {
            if let Err(e) = tx.commit().await {
                tracing::error!(alias = %alias, error = %e, "commit failed");
                for (rest, tx) in pending {
                    if let Err(e) = tx.rollback().await {
                        tracing::warn!(alias = %rest, error = %e, "rollback failed");
                    }
                }
                return Err(e.into());
            }
            tracing::debug!(alias = %alias, "transaction committed");
        }
        Ok(())
    }

    pub async fn rollback(&self) {
        let open: OpenTransactions = std::mem::take(&mut *self.open.lock().await);
        for (alias, tx) in open {
            match tx.rollback().await {
                Ok(()) => tracing::debug!(alias = %alias, "transaction rolled back"),
                Err(e) => tracing::warn!(alias = %alias, error = %e, "rollback failed"),
            }
        }
    }
}

async fn transaction<'a>(
    databases: &Databases,
    open: &'a mut OpenTransactions,
    alias: &str,
) -> Result<&'a mut Transaction<'static, Any>, AppError> {
    let found = open.iter().position(|(a, _)| a == alias);
    let index = match found {
        Some(i) => i,
        None => {
            let tx = databases.get(alias)?.pool.begin().await?;
            tracing::debug!(alias = %alias, "transaction opened");
            open.push((alias.to_string(), tx));
            open.len() - 1
        }
    };
    Ok(&mut open[index].1)
}
