//! Drive persistence
//!
//! Concrete CRUD over the `drives` table: `gateway-core::ports` has no port
//! trait here (only one implementation of drive persistence ever makes
//! sense), so `gateway-server` and `gateway-cli` consume `DriveStore`
//! directly, the way they consume `gateway-redirect::RedirectCache`.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use gateway_core::domain::{Drive, DriveId, DriveKind};

#[derive(Debug, Error)]
pub enum DriveStoreError {
    #[error("drive not found: {0}")]
    NotFound(DriveId),

    #[error("drive store I/O error: {0}")]
    Io(#[source] anyhow::Error),
}

fn drive_kind_to_str(kind: DriveKind) -> &'static str {
    match kind {
        DriveKind::Drive115 => "drive115",
    }
}

fn drive_kind_from_str(s: &str) -> Result<DriveKind, DriveStoreError> {
    match s {
        "drive115" => Ok(DriveKind::Drive115),
        other => Err(DriveStoreError::Io(anyhow::anyhow!("unknown drive kind '{other}'"))),
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DriveStoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DriveStoreError::Io(anyhow::anyhow!("invalid timestamp '{s}': {e}")))
}

fn drive_from_row(row: &SqliteRow) -> Result<Drive, DriveStoreError> {
    let id: String = row.get("id");
    let kind_str: String = row.get("kind");
    let created_at_str: String = row.get("created_at");
    let last_used_at_str: Option<String> = row.get("last_used_at");

    Ok(Drive {
        id: DriveId::from(id),
        name: row.get("name"),
        kind: drive_kind_from_str(&kind_str)?,
        created_at: parse_datetime(&created_at_str)?,
        last_used_at: last_used_at_str.map(|s| parse_datetime(&s)).transpose()?,
        is_current: row.get::<i64, _>("is_current") != 0,
    })
}

/// CRUD over configured drives, including the "at most one current drive"
/// invariant (design note §4.8).
pub struct DriveStore {
    pool: SqlitePool,
}

impl DriveStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, drive: Drive) -> Result<Drive, DriveStoreError> {
        sqlx::query(
            "INSERT INTO drives (id, name, kind, created_at, last_used_at, is_current) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(drive.id.as_str())
        .bind(&drive.name)
        .bind(drive_kind_to_str(drive.kind))
        .bind(drive.created_at.to_rfc3339())
        .bind(drive.last_used_at.map(|dt| dt.to_rfc3339()))
        .bind(drive.is_current as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| DriveStoreError::Io(e.into()))?;

        tracing::info!(drive_id = %drive.id, name = %drive.name, "drive created");
        Ok(drive)
    }

    pub async fn get(&self, drive_id: &DriveId) -> Result<Drive, DriveStoreError> {
        let row = sqlx::query("SELECT * FROM drives WHERE id = ?")
            .bind(drive_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DriveStoreError::Io(e.into()))?;

        match row {
            Some(ref r) => drive_from_row(r),
            None => Err(DriveStoreError::NotFound(drive_id.clone())),
        }
    }

    pub async fn list(&self) -> Result<Vec<Drive>, DriveStoreError> {
        let rows = sqlx::query("SELECT * FROM drives ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DriveStoreError::Io(e.into()))?;

        rows.iter().map(drive_from_row).collect()
    }

    pub async fn touch(&self, drive_id: &DriveId) -> Result<(), DriveStoreError> {
        let result = sqlx::query("UPDATE drives SET last_used_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(drive_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DriveStoreError::Io(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(DriveStoreError::NotFound(drive_id.clone()));
        }
        Ok(())
    }

    /// Marks `drive_id` as the only current drive, clearing the flag on all
    /// others in the same transaction.
    pub async fn set_current(&self, drive_id: &DriveId) -> Result<(), DriveStoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| DriveStoreError::Io(e.into()))?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM drives WHERE id = ?")
            .bind(drive_id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DriveStoreError::Io(e.into()))?;
        if exists.is_none() {
            return Err(DriveStoreError::NotFound(drive_id.clone()));
        }

        sqlx::query("UPDATE drives SET is_current = 0")
            .execute(&mut *tx)
            .await
            .map_err(|e| DriveStoreError::Io(e.into()))?;
        sqlx::query("UPDATE drives SET is_current = 1 WHERE id = ?")
            .bind(drive_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| DriveStoreError::Io(e.into()))?;

        tx.commit().await.map_err(|e| DriveStoreError::Io(e.into()))?;
        tracing::info!(%drive_id, "drive set as current");
        Ok(())
    }

    /// Deletes a drive; cascades to its tasks, stub records, and run logs
    /// via the schema's `ON DELETE CASCADE` foreign keys.
    pub async fn delete(&self, drive_id: &DriveId) -> Result<(), DriveStoreError> {
        let result = sqlx::query("DELETE FROM drives WHERE id = ?")
            .bind(drive_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DriveStoreError::Io(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(DriveStoreError::NotFound(drive_id.clone()));
        }
        tracing::info!(%drive_id, "drive deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DatabasePool;
    use std::str::FromStr;

    fn sample() -> Drive {
        Drive::new(DriveId::from_str("drive115_1").unwrap(), "my 115", DriveKind::Drive115)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let db = DatabasePool::in_memory().await.unwrap();
        let store = DriveStore::new(db.pool().clone());
        let drive = sample();
        store.create(drive.clone()).await.unwrap();

        let fetched = store.get(&drive.id).await.unwrap();
        assert_eq!(fetched.name, "my 115");
        assert!(!fetched.is_current);
    }

    #[tokio::test]
    async fn set_current_is_exclusive() {
        let db = DatabasePool::in_memory().await.unwrap();
        let store = DriveStore::new(db.pool().clone());
        let a = Drive::new(DriveId::from_str("drive115_a").unwrap(), "a", DriveKind::Drive115);
        let b = Drive::new(DriveId::from_str("drive115_b").unwrap(), "b", DriveKind::Drive115);
        store.create(a.clone()).await.unwrap();
        store.create(b.clone()).await.unwrap();

        store.set_current(&a.id).await.unwrap();
        store.set_current(&b.id).await.unwrap();

        let drives = store.list().await.unwrap();
        let current: Vec<_> = drives.iter().filter(|d| d.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].id, b.id);
    }

    #[tokio::test]
    async fn delete_missing_drive_errors_not_found() {
        let db = DatabasePool::in_memory().await.unwrap();
        let store = DriveStore::new(db.pool().clone());
        assert!(matches!(
            store.delete(&DriveId::from_str("nope").unwrap()).await,
            Err(DriveStoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_cascades_to_tasks() {
        let db = DatabasePool::in_memory().await.unwrap();
        let store = DriveStore::new(db.pool().clone());
        let drive = sample();
        store.create(drive.clone()).await.unwrap();

        sqlx::query(
            "INSERT INTO tasks (task_id, name, drive_id, source_root_id, output_dir, \
             filter_json, schedule_json, watch_json, options_json, state) \
             VALUES ('t1', 'x', ?, '0', '/m', '{}', '{}', '{}', '{}', 'idle')",
        )
        .bind(drive.id.as_str())
        .execute(db.pool())
        .await
        .unwrap();

        store.delete(&drive.id).await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM tasks")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }
}
