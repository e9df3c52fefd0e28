//! Per-user embedded relational store.
//!
//! One SQLite database file per user under `<storage_path>/user_<user_id>.db`
//! (legacy single-user path: `<storage_path>/shared.db`). Single-writer semantics
//! are enforced with an internal async mutex; an idle-barrier counter tracks
//! in-flight writes so tests and shutdown can observe quiescence.
//!
//! Grounded in `src/db.rs`'s `Database::new(path)` (schema bootstrap from a bare
//! file path) and `src/db/core.rs`'s tolerant `ALTER TABLE ... ADD COLUMN`
//! migration idiom.

pub mod access;
pub mod email;
pub mod files;
pub mod jobs;
pub mod registry;
pub mod schema;
pub mod search;

pub use email::{EmailIndex, SearchCriteria};
pub use registry::StoreRegistry;

use crate::error::{MailIndexError, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

/// A single user's embedded database.
pub struct Store {
    pub(crate) pool: SqlitePool,
    pub(crate) path: PathBuf,
    /// The user this Store was opened for, if any (absent for the legacy shared
    /// store). Used as the last fallback when resolving a row's `user_id` on
    /// upsert.
    pub(crate) owner_user_id: Option<String>,
    /// Writer lock: one in-flight write transaction at a time per Store.
    writer_lock: Mutex<()>,
    /// Count of in-flight writes; `wait_for_idle` resolves when this hits zero.
    in_flight: AtomicUsize,
    idle_notify: Notify,
}

impl Store {
    /// Open (creating if absent) the database file at `path`, bootstrap schema,
    /// and run the idempotent migration pass.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_for_user(path, None).await
    }

    /// Open a store scoped to `owner_user_id`, used by `StoreRegistry::get`.
    pub async fn open_for_user(
        path: impl AsRef<Path>,
        owner_user_id: Option<String>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        if !path.exists() {
            tokio::fs::File::create(&path).await?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self {
            pool,
            path,
            owner_user_id,
            writer_lock: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
            idle_notify: Notify::new(),
        };
        store.bootstrap_schema().await?;
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub async fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_for_user(None).await
    }

    pub async fn open_in_memory_for_user(owner_user_id: Option<String>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self {
            pool,
            path: PathBuf::from(":memory:"),
            owner_user_id,
            writer_lock: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
            idle_notify: Notify::new(),
        };
        store.bootstrap_schema().await?;
        store.migrate().await?;
        Ok(store)
    }

    async fn bootstrap_schema(&self) -> Result<()> {
        // Cascades on file_access_permissions / cleanup_jobs depend on this.
        sqlx::query("PRAGMA foreign_keys = ON").execute(&self.pool).await?;
        for stmt in schema::CREATE_TABLE_STATEMENTS {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Migration is detected by the presence of the first analyzer column
    /// (`importance_score`); absent means this store predates analyzer columns.
    async fn migrate(&self) -> Result<()> {
        let has_analyzer_column = sqlx::query("SELECT importance_score FROM email_index LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .is_ok();

        if !has_analyzer_column {
            for stmt in schema::MIGRATION_ADD_ANALYZER_COLUMNS {
                // "duplicate column name" is tolerated as idempotent.
                let _ = sqlx::query(stmt).execute(&self.pool).await;
            }
        }
        for stmt in schema::MIGRATION_ANALYZER_INDICES {
            let _ = sqlx::query(stmt).execute(&self.pool).await;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn enter_write(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    fn exit_write(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle_notify.notify_waiters();
        }
    }

    /// Resolves once no write is in flight. Does not prevent new writes from
    /// starting after it resolves.
    pub async fn wait_for_idle(&self) {
        loop {
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            self.idle_notify.notified().await;
        }
    }

    pub async fn close(&self) {
        self.wait_for_idle().await;
        self.pool.close().await;
    }

    /// `execute(sql, params)` for a single DML/DDL statement.
    pub async fn execute(&self, sql: &str, params: &[Param]) -> Result<Changes> {
        let _guard = self.writer_lock.lock().await;
        self.enter_write();
        let result = run_bound(&self.pool, sql, params).await;
        self.exit_write();
        let res = result?;
        Ok(Changes {
            changes: res.rows_affected() as i64,
            last_id: res.last_insert_rowid(),
        })
    }

    /// `execute` over a batch of param vectors, all inside one transaction;
    /// rolls back on the first error.
    pub async fn execute_batch(&self, sql: &str, batches: &[Vec<Param>]) -> Result<Changes> {
        let _guard = self.writer_lock.lock().await;
        self.enter_write();
        let result = async {
            let mut tx = self.pool.begin().await?;
            let mut total_changes = 0i64;
            let mut last_id = 0i64;
            for params in batches {
                let mut q = sqlx::query(sql);
                for p in params {
                    q = bind_param(q, p);
                }
                let res = q.execute(&mut *tx).await?;
                total_changes += res.rows_affected() as i64;
                last_id = res.last_insert_rowid();
            }
            tx.commit().await?;
            Ok::<_, sqlx::Error>(Changes {
                changes: total_changes,
                last_id,
            })
        }
        .await;
        self.exit_write();
        Ok(result?)
    }

    pub async fn query_optional(&self, sql: &str, params: &[Param]) -> Result<Option<Row>> {
        let mut q = sqlx::query(sql);
        for p in params {
            q = bind_param(q, p);
        }
        let row = q.fetch_optional(&self.pool).await?;
        Ok(row.map(Row))
    }

    pub async fn query_all(&self, sql: &str, params: &[Param]) -> Result<Vec<Row>> {
        let mut q = sqlx::query(sql);
        for p in params {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Row).collect())
    }
}

async fn run_bound(
    pool: &SqlitePool,
    sql: &str,
    params: &[Param],
) -> std::result::Result<sqlx::sqlite::SqliteQueryResult, sqlx::Error> {
    let mut q = sqlx::query(sql);
    for p in params {
        q = bind_param(q, p);
    }
    q.execute(pool).await
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    p: &'q Param,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match p {
        Param::Text(s) => q.bind(s.as_str()),
        Param::Int(i) => q.bind(*i),
        Param::Float(f) => q.bind(*f),
        Param::Bool(b) => q.bind(*b),
        Param::Null => q.bind(Option::<String>::None),
    }
}

#[derive(Debug, Clone)]
pub enum Param {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}
impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}
impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}
impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}
impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}
impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Param::Null)
    }
}

/// Thin wrapper so callers outside this module stay on `sqlx::Row` without a
/// direct sqlx dependency at call sites that only pattern-match by column name.
pub struct Row(pub sqlx::sqlite::SqliteRow);

#[derive(Debug, Clone, Copy)]
pub struct Changes {
    pub changes: i64,
    pub last_id: i64,
}

/// Derive the canonical per-user Store path under `base`.
pub fn user_db_path(base: impl AsRef<Path>, user_id: &str) -> PathBuf {
    base.as_ref().join(format!("user_{user_id}.db"))
}

/// Legacy single-user path used when no user scoping is in effect.
pub fn legacy_db_path(base: impl AsRef<Path>) -> PathBuf {
    base.as_ref().join("shared.db")
}

pub(crate) fn map_store_err<E: std::fmt::Display>(e: E) -> MailIndexError {
    MailIndexError::StoreError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_in_memory_bootstraps_schema() {
        let store = Store::open_in_memory().await.unwrap();
        let rows = store
            .query_all("SELECT COUNT(*) as c FROM email_index", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn migration_is_idempotent() {
        let store = Store::open_in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_idle_resolves_with_no_writes() {
        let store = Store::open_in_memory().await.unwrap();
        store.wait_for_idle().await;
    }
}
