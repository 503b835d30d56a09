//! Database connection pool management
//!
//! WAL journal mode, automatic directory creation, schema migration on
//! first connection, and an in-memory mode for tests.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to the store database: {0}")]
    ConnectionFailed(String),

    #[error("failed to run store migrations: {0}")]
    MigrationFailed(String),
}

/// Manages a pool of SQLite connections for the gateway's relational state.
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path`, enabling WAL
    /// mode and running migrations.
    pub async fn new(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::ConnectionFailed(format!("failed to create {}: {e}", parent.display())))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("failed to connect to {}: {e}", db_path.display())))?;

        Self::run_migrations(&pool).await?;
        tracing::info!(path = %db_path.display(), "store database pool initialized");
        Ok(Self { pool })
    }

    /// Creates an in-memory database for tests. A single connection is used
    /// so data survives across queries (SQLite in-memory DBs are
    /// per-connection).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(format!("failed to create in-memory database: {e}")))?;

        Self::run_migrations(&pool).await?;
        tracing::debug!("in-memory store database pool initialized");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
        let migration_sql = include_str!("migrations/0001_initial.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("failed to run initial migration: {e}")))?;
        tracing::debug!("store migrations completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_pool_applies_migrations() {
        let pool = DatabasePool::in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM drives")
            .fetch_one(pool.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
