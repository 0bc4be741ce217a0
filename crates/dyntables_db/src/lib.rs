//! Database handle for Dynamic Tables.
//!
//! One [`DbConnection`] is created by the caller and passed into whatever
//! needs the database; there is no global connection. It exposes the three
//! things the schema layer needs from the live database:
//!
//! - DDL execution, one statement ([`DbConnection::execute_ddl`]) or an
//!   all-or-nothing batch ([`DbConnection::execute_ddl_batch`])
//! - the cross-process write lock ([`DbConnection::lock_for_write`])
//! - live-schema introspection ([`DbConnection::table_exists`],
//!   [`DbConnection::table_columns`], [`DbConnection::list_tables`])
//! - the pool itself for parameterized catalog queries
//!
//! # Usage
//!
//! ```rust,ignore
//! use dyntables_db::DbConnection;
//!
//! let conn = DbConnection::open("~/.dyntables/tables.sqlite").await?;
//! if !conn.table_exists("users").await? {
//!     conn.execute_ddl(r#"CREATE TABLE "users" ("id" INTEGER PRIMARY KEY)"#).await?;
//! }
//! ```

mod error;
pub mod ident;
pub mod lock;

pub use error::{DbError, Result};
pub use ident::{quote_ident, validate_identifier};
pub use lock::DbLockGuard;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, debug_span, info, warn, Instrument};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite connection URL (`sqlite:<path>` or `sqlite::memory:`)
    pub url: String,
    /// Maximum connections in the pool
    pub max_connections: u32,
    /// How long a statement waits on a locked database file
    pub busy_timeout: Duration,
    /// Database file, used for the write lock; `None` in memory
    pub path: Option<PathBuf>,
    /// How long a schema change waits for the write lock
    pub lock_timeout: Duration,
}

impl DbConfig {
    /// File-backed configuration; the file is created if missing.
    pub fn sqlite(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite:{}", path.as_ref().display()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            path: Some(path.as_ref().to_path_buf()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// In-memory configuration (for testing).
    ///
    /// Every SQLite memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub fn sqlite_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            path: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    fn is_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// A live column as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    pub declared_type: String,
}

/// Shared handle to the live database.
#[derive(Clone)]
pub struct DbConnection {
    pool: SqlitePool,
    path: Option<PathBuf>,
    lock_timeout: Duration,
}

impl DbConnection {
    /// Open or create a database file at the given path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Self::open_with(&DbConfig::sqlite(path)).await?;
        info!(path = %path.display(), "Database opened");
        Ok(conn)
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        Self::open_with(&DbConfig::sqlite_memory()).await
    }

    /// Open a database from explicit settings.
    pub async fn open_with(config: &DbConfig) -> Result<Self> {
        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .busy_timeout(config.busy_timeout);
        if !config.is_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        if config.is_memory() {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;
        Ok(Self {
            pool,
            path: config.path.clone(),
            lock_timeout: config.lock_timeout,
        })
    }

    /// Get the underlying connection pool for parameterized queries.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Database file, `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Take the cross-process write lock, waiting up to the configured
    /// timeout. In-memory databases are private to one pool and need none.
    pub async fn lock_for_write(&self) -> Result<Option<DbLockGuard>> {
        match &self.path {
            Some(path) => lock::lock_exclusive(path, self.lock_timeout).await.map(Some),
            None => Ok(None),
        }
    }

    /// Close the pool.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Execute one raw DDL statement.
    ///
    /// Identifiers inside `sql` must already have passed
    /// [`validate_identifier`]; this method does not inspect the statement.
    pub async fn execute_ddl(&self, sql: &str) -> Result<()> {
        let span = debug_span!("ddl", op = sql_op_name(sql));
        let started = Instant::now();
        sqlx::query(sql)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        debug!(
            op = sql_op_name(sql),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "DDL executed"
        );
        Ok(())
    }

    /// Execute DDL statements in one transaction: all of them apply or none.
    ///
    /// A failing statement is reported as [`DbError::Statement`] with its
    /// position in `statements`, after the transaction has been rolled back.
    pub async fn execute_ddl_batch(&self, statements: &[String]) -> Result<()> {
        let span = debug_span!("ddl_batch", statements = statements.len());
        async {
            let started = Instant::now();
            let mut tx = self.pool.begin().await?;

            for (index, sql) in statements.iter().enumerate() {
                if let Err(source) = sqlx::query(sql.as_str()).execute(&mut *tx).await {
                    if let Err(e) = tx.rollback().await {
                        warn!(error = %e, "Rollback of DDL batch failed");
                    }
                    return Err(DbError::Statement { index, source });
                }
                debug!(op = sql_op_name(sql), index, "DDL statement executed");
            }

            tx.commit().await?;
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "DDL batch committed"
            );
            Ok::<(), DbError>(())
        }
        .instrument(span)
        .await
    }

    /// Whether a table with this name exists in the live schema.
    ///
    /// SQLite table names are case-insensitive, so the comparison is too.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ? COLLATE NOCASE",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Columns of a live table in declaration order.
    pub async fn table_columns(&self, name: &str) -> Result<Vec<LiveColumn>> {
        let rows = sqlx::query("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(DbError::not_found(format!("Table not found: {}", name)));
        }

        rows.into_iter()
            .map(|row| {
                Ok(LiveColumn {
                    name: row.try_get("name")?,
                    declared_type: row.try_get("type")?,
                })
            })
            .collect()
    }

    /// Names of all user tables in the live schema.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let names = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }
}

fn sql_op_name(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("tables.sqlite");

        let conn = DbConnection::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        conn.close().await;
    }

    #[tokio::test]
    async fn test_table_exists_is_case_insensitive() {
        let conn = DbConnection::open_memory().await.unwrap();
        assert!(!conn.table_exists("users").await.unwrap());

        conn.execute_ddl(r#"CREATE TABLE "users" ("id" INTEGER PRIMARY KEY)"#)
            .await
            .unwrap();

        assert!(conn.table_exists("users").await.unwrap());
        assert!(conn.table_exists("USERS").await.unwrap());
    }

    #[tokio::test]
    async fn test_table_columns_in_declaration_order() {
        let conn = DbConnection::open_memory().await.unwrap();
        conn.execute_ddl(
            r#"CREATE TABLE "t" ("id" INTEGER PRIMARY KEY AUTOINCREMENT, "b" varchar(255), "a" boolean)"#,
        )
        .await
        .unwrap();

        let columns = conn.table_columns("t").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "b", "a"]);
        assert_eq!(columns[1].declared_type, "varchar(255)");
    }

    #[tokio::test]
    async fn test_table_columns_missing_table() {
        let conn = DbConnection::open_memory().await.unwrap();
        let err = conn.table_columns("ghost").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_execute_ddl_surfaces_driver_error() {
        let conn = DbConnection::open_memory().await.unwrap();
        let err = conn
            .execute_ddl(r#"ALTER TABLE "ghost" ADD COLUMN "x" text"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Sqlx(_)));
    }

    #[tokio::test]
    async fn test_ddl_batch_rolls_back_on_failure() {
        let conn = DbConnection::open_memory().await.unwrap();
        conn.execute_ddl(r#"CREATE TABLE "t" ("id" INTEGER PRIMARY KEY, "c" text)"#)
            .await
            .unwrap();

        let err = conn
            .execute_ddl_batch(&[
                r#"ALTER TABLE "t" ADD COLUMN "b" text"#.to_string(),
                r#"ALTER TABLE "t" ADD COLUMN "c" text"#.to_string(),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Statement { index: 1, .. }));

        let names: Vec<_> = conn
            .table_columns("t")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["id", "c"]);
    }

    #[tokio::test]
    async fn test_ddl_batch_applies_all() {
        let conn = DbConnection::open_memory().await.unwrap();
        conn.execute_ddl_batch(&[
            r#"CREATE TABLE "t" ("id" INTEGER PRIMARY KEY)"#.to_string(),
            r#"ALTER TABLE "t" ADD COLUMN "a" text"#.to_string(),
            r#"ALTER TABLE "t" ADD COLUMN "b" boolean"#.to_string(),
        ])
        .await
        .unwrap();
        assert_eq!(conn.table_columns("t").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_write_lock_only_for_files() {
        let memory = DbConnection::open_memory().await.unwrap();
        assert!(memory.path().is_none());
        assert!(memory.lock_for_write().await.unwrap().is_none());

        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("tables.sqlite");
        let config = DbConfig::sqlite(&db_path).with_lock_timeout(Duration::from_millis(50));
        let first = DbConnection::open_with(&config).await.unwrap();
        let second = DbConnection::open_with(&config).await.unwrap();

        let guard = first.lock_for_write().await.unwrap().unwrap();
        let err = second.lock_for_write().await.unwrap_err();
        assert!(matches!(err, DbError::Locked(_)));

        drop(guard);
        assert!(second.lock_for_write().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_tables() {
        let conn = DbConnection::open_memory().await.unwrap();
        conn.execute_ddl(r#"CREATE TABLE "b" ("id" INTEGER PRIMARY KEY AUTOINCREMENT)"#)
            .await
            .unwrap();
        conn.execute_ddl(r#"CREATE TABLE "a" ("id" INTEGER PRIMARY KEY)"#)
            .await
            .unwrap();

        // AUTOINCREMENT creates sqlite_sequence, which must not be listed.
        assert_eq!(conn.list_tables().await.unwrap(), ["a", "b"]);
    }
}
