//! Audit database connection pool
//!
//! Mirrors `gateway-store::pool::DatabasePool`'s WAL-mode-plus-migration
//! shape, kept deliberately separate so the audit trail's own schema never
//! needs to migrate in lockstep with drives/tasks/stub_records.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditDbError {
    #[error("failed to connect to the audit database: {0}")]
    ConnectionFailed(String),

    #[error("failed to run audit migrations: {0}")]
    MigrationFailed(String),
}

/// Owns the SQLite pool backing the audit event log.
#[derive(Clone)]
pub struct AuditDb {
    pool: SqlitePool,
}

impl AuditDb {
    pub async fn new(db_path: &Path) -> Result<Self, AuditDbError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditDbError::ConnectionFailed(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                AuditDbError::ConnectionFailed(format!("failed to connect to {}: {e}", db_path.display()))
            })?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// In-memory database for tests: a single connection so data survives
    /// across queries (SQLite in-memory DBs are per-connection).
    pub async fn in_memory() -> Result<Self, AuditDbError> {
        let options = SqliteConnectOptions::new().filename(":memory:").journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| AuditDbError::ConnectionFailed(format!("failed to create in-memory database: {e}")))?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<(), AuditDbError> {
        let migration_sql = include_str!("migrations/0001_audit.sql");
        sqlx::raw_sql(migration_sql)
            .execute(pool)
            .await
            .map_err(|e| AuditDbError::MigrationFailed(format!("failed to run initial migration: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_pool_applies_migrations() {
        let db = AuditDb::in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM audit_events").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 0);
    }
}
