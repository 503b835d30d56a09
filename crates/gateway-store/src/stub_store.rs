//! SQLite implementation of the `StubStore` port (C6)
//!
//! Explicit column-per-field mapping, row-mapping helper functions, and
//! query-scoped `tracing::trace!` logging. `(task_id, item_id)` is a
//! natural key, so `upsert` is a single `INSERT ... ON CONFLICT(task_id,
//! item_id) DO UPDATE SET ...`, mutating the existing row in place rather
//! than deleting and reinserting it.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use gateway_core::domain::{RecordId, RecordState, RemoteItemId, StubRecord, TaskId};
use gateway_core::ports::stub_store::{StubStore, StubStoreError};

fn record_state_to_str(state: RecordState) -> &'static str {
    match state {
        RecordState::Active => "active",
        RecordState::Deleted => "deleted",
    }
}

fn record_state_from_str(s: &str) -> Result<RecordState, StubStoreError> {
    match s {
        "active" => Ok(RecordState::Active),
        "deleted" => Ok(RecordState::Deleted),
        other => Err(StubStoreError::Io(anyhow::anyhow!(
            "unknown stub record state '{other}'"
        ))),
    }
}

fn stub_record_from_row(row: &SqliteRow) -> Result<StubRecord, StubStoreError> {
    let task_id_str: String = row.get("task_id");
    let item_id_str: String = row.get("item_id");
    let size: Option<i64> = row.get("size");
    let modified_at_str: Option<String> = row.get("modified_at");
    let state_str: String = row.get("state");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    let task_id = TaskId::from_str(&task_id_str)
        .map_err(|e| StubStoreError::Io(anyhow::anyhow!("invalid task id '{task_id_str}': {e}")))?;

    Ok(StubRecord {
        task_id,
        item_id: RemoteItemId::from(item_id_str),
        file_name: row.get("file_name"),
        size: size.map(|s| s as u64),
        modified_at: modified_at_str.map(|s| parse_datetime(&s)).transpose()?,
        stub_path: row.get("stub_path"),
        stub_contents: row.get("stub_contents"),
        state: record_state_from_str(&state_str)?,
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StubStoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StubStoreError::Io(anyhow::anyhow!("invalid timestamp '{s}': {e}")))
}

/// SQLite-backed `StubStore`.
pub struct SqliteStubStore {
    pool: SqlitePool,
}

impl SqliteStubStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StubStore for SqliteStubStore {
    async fn upsert(&self, record: &StubRecord) -> Result<(), StubStoreError> {
        sqlx::query(
            "INSERT INTO stub_records \
             (task_id, item_id, file_name, size, modified_at, stub_path, stub_contents, \
              state, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(task_id, item_id) DO UPDATE SET \
               file_name = excluded.file_name, size = excluded.size, \
               modified_at = excluded.modified_at, stub_path = excluded.stub_path, \
               stub_contents = excluded.stub_contents, state = excluded.state, \
               updated_at = excluded.updated_at",
        )
        .bind(record.task_id.to_string())
        .bind(record.item_id.as_str())
        .bind(&record.file_name)
        .bind(record.size.map(|s| s as i64))
        .bind(record.modified_at.map(|dt| dt.to_rfc3339()))
        .bind(&record.stub_path)
        .bind(&record.stub_contents)
        .bind(record_state_to_str(record.state))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StubStoreError::Io(e.into()))?;

        tracing::trace!(record_id = %record.record_id(), "upserted stub record");
        Ok(())
    }

    async fn delete(&self, record_id: &RecordId) -> Result<(), StubStoreError> {
        let result = sqlx::query("DELETE FROM stub_records WHERE task_id = ? AND item_id = ?")
            .bind(record_id.task_id.to_string())
            .bind(record_id.item_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StubStoreError::Io(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StubStoreError::NotFound(record_id.clone()));
        }
        Ok(())
    }

    async fn mark_deleted(&self, record_id: &RecordId) -> Result<(), StubStoreError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE stub_records SET state = 'deleted', updated_at = ? \
             WHERE task_id = ? AND item_id = ?",
        )
        .bind(&now)
        .bind(record_id.task_id.to_string())
        .bind(record_id.item_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StubStoreError::Io(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(StubStoreError::NotFound(record_id.clone()));
        }
        Ok(())
    }

    async fn find_by_task(
        &self,
        task_id: &TaskId,
        state: Option<RecordState>,
    ) -> Result<Vec<StubRecord>, StubStoreError> {
        let rows = match state {
            Some(state) => {
                sqlx::query("SELECT * FROM stub_records WHERE task_id = ? AND state = ?")
                    .bind(task_id.to_string())
                    .bind(record_state_to_str(state))
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM stub_records WHERE task_id = ?")
                    .bind(task_id.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(|e| StubStoreError::Io(e.into()))?;

        rows.iter().map(stub_record_from_row).collect()
    }

    async fn find_by_item(
        &self,
        task_id: &TaskId,
        item_id: &RemoteItemId,
    ) -> Result<Option<StubRecord>, StubStoreError> {
        let row = sqlx::query("SELECT * FROM stub_records WHERE task_id = ? AND item_id = ?")
            .bind(task_id.to_string())
            .bind(item_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StubStoreError::Io(e.into()))?;

        row.as_ref().map(stub_record_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DatabasePool;

    fn sample(task_id: TaskId) -> StubRecord {
        let now = Utc::now();
        StubRecord {
            task_id,
            item_id: RemoteItemId::from("item-1"),
            file_name: "movie.mkv".into(),
            size: Some(1024),
            modified_at: Some(now),
            stub_path: "/mnt/media/movie.strm".into(),
            stub_contents: "stream://drive115/h1".into(),
            state: RecordState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded_store() -> (SqliteStubStore, TaskId) {
        let db = DatabasePool::in_memory().await.unwrap();
        let task_id = TaskId::new();
        sqlx::query(
            "INSERT INTO drives (id, name, kind, created_at, is_current) VALUES ('d1','n','drive115',?,0)",
        )
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO tasks (task_id, name, drive_id, source_root_id, output_dir, \
             filter_json, schedule_json, watch_json, options_json, state) \
             VALUES (?, 't', 'd1', '0', '/m', '{}', '{}', '{}', '{}', 'idle')",
        )
        .bind(task_id.to_string())
        .execute(db.pool())
        .await
        .unwrap();
        (SqliteStubStore::new(db.pool().clone()), task_id)
    }

    #[tokio::test]
    async fn upsert_then_find_by_item_round_trips() {
        let (store, task_id) = seeded_store().await;
        let record = sample(task_id.clone());
        store.upsert(&record).await.unwrap();

        let found = store
            .find_by_item(&task_id, &RemoteItemId::from("item-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.stub_path, record.stub_path);
        assert_eq!(found.size, record.size);
    }

    #[tokio::test]
    async fn upsert_twice_updates_in_place() {
        let (store, task_id) = seeded_store().await;
        let mut record = sample(task_id.clone());
        store.upsert(&record).await.unwrap();

        record.stub_path = "/mnt/media/renamed.strm".into();
        store.upsert(&record).await.unwrap();

        let rows = store.find_by_task(&task_id, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stub_path, "/mnt/media/renamed.strm");
    }

    #[tokio::test]
    async fn mark_deleted_flips_state_without_removing_row() {
        let (store, task_id) = seeded_store().await;
        let record = sample(task_id.clone());
        store.upsert(&record).await.unwrap();
        store.mark_deleted(&record.record_id()).await.unwrap();

        let active = store.find_by_task(&task_id, Some(RecordState::Active)).await.unwrap();
        assert!(active.is_empty());
        let deleted = store.find_by_task(&task_id, Some(RecordState::Deleted)).await.unwrap();
        assert_eq!(deleted.len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_record_errors_not_found() {
        let (store, task_id) = seeded_store().await;
        let record_id = RecordId::new(task_id, RemoteItemId::from("missing"));
        assert!(matches!(store.delete(&record_id).await, Err(StubStoreError::NotFound(_))));
    }
}
