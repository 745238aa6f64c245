//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::Transaction;
use sqlx::sqlite::{Sqlite, SqlitePool};
use std::path::Path;
use std::time::Duration;

use super::Database;

/// Busy timeout used by [`Database::new`]
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        Self::connect(path, DEFAULT_BUSY_TIMEOUT).await
    }

    /// Create a new database connection with an explicit busy timeout
    ///
    /// The busy timeout bounds how long a writer waits while another
    /// connection holds the write lock.
    pub async fn connect(path: &Path, busy_timeout: Duration) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };

        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        if current_version.unwrap_or(0) < 1 {
            Self::migrate_v1(&mut conn).await?;
        }

        Ok(())
    }

    /// Migration v1: Create the global tables
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        tracing::info!("Applying database migration v1");

        // Wrap migration in a transaction so partial failures don't leave the DB in a broken state
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;

        let result = async {
            Self::create_global_table(
                conn,
                "groups",
                r#"
                CREATE TABLE groups (
                    name TEXT NOT NULL PRIMARY KEY COLLATE NOCASE,
                    created_at INTEGER NOT NULL
                )
                "#,
            )
            .await?;
            Self::create_global_table(
                conn,
                "history",
                r#"
                CREATE TABLE history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    task_kind TEXT NOT NULL,
                    group_name TEXT NOT NULL,
                    started_at INTEGER NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    reason TEXT,
                    processed INTEGER NOT NULL,
                    total INTEGER NOT NULL
                )
                "#,
            )
            .await?;
            Self::create_global_table(
                conn,
                "parsed_audience",
                r#"
                CREATE TABLE parsed_audience (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    audience_name TEXT NOT NULL,
                    total_audience_count INTEGER NOT NULL,
                    processed_audience_count INTEGER NOT NULL,
                    audience_date TEXT NOT NULL
                )
                "#,
            )
            .await?;
            Self::create_global_table(
                conn,
                "runtime_state",
                r#"
                CREATE TABLE runtime_state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
            )
            .await?;
            Self::create_global_table(
                conn,
                "idx_history_started_at",
                "CREATE INDEX idx_history_started_at ON history(started_at)",
            )
            .await?;
            Self::record_migration(conn, 1).await?;
            Ok::<(), Error>(())
        }
        .await;

        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v1: {}",
                            e
                        )))
                    })?;
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                return Err(e);
            }
        }

        tracing::info!("Database migration v1 complete");
        Ok(())
    }

    /// Run one DDL statement of a migration
    async fn create_global_table(conn: &mut SqliteConnection, name: &str, ddl: &str) -> Result<()> {
        sqlx::query(ddl).execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create {}: {}",
                name, e
            )))
        })?;
        Ok(())
    }

    /// Record that a migration version has been applied
    async fn record_migration(conn: &mut SqliteConnection, version: i64) -> Result<()> {
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration v{}: {}",
                    version, e
                )))
            })?;
        Ok(())
    }

    /// Open a write transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so a transaction that
    /// reads before it writes cannot be invalidated by a concurrent writer.
    /// The returned [`Transaction`] rolls back if it is dropped before
    /// [`finish_transaction`](Self::finish_transaction) runs, e.g. when the
    /// caller's future is cancelled.
    pub(crate) async fn begin_immediate(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(Error::Sqlx)
    }

    /// Commit on success, roll back on failure, and pass the result through
    pub(crate) async fn finish_transaction<T>(
        tx: Transaction<'static, Sqlite>,
        result: Result<T>,
    ) -> Result<T> {
        match result {
            Ok(value) => {
                tx.commit().await.map_err(Error::Sqlx)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Close the database connection
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
