//! Stub Record Store port (C6)

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{RecordId, RecordState, RemoteItemId, StubRecord, TaskId};

#[derive(Debug, Error)]
pub enum StubStoreError {
    #[error("stub record not found: {0}")]
    NotFound(RecordId),

    #[error("stub store I/O error: {0}")]
    Io(#[source] anyhow::Error),
}

/// Persisted set of `(task_id, item_id) -> StubRecord`.
///
/// `(task_id, item_id)` is a natural key (design note §4.6); `upsert` is keyed on
/// it so the Sync Engine never has to distinguish insert from update.
#[async_trait]
pub trait StubStore: Send + Sync {
    async fn upsert(&self, record: &StubRecord) -> Result<(), StubStoreError>;

    async fn delete(&self, record_id: &RecordId) -> Result<(), StubStoreError>;

    async fn mark_deleted(&self, record_id: &RecordId) -> Result<(), StubStoreError>;

    /// Bulk read indexed on `task_id` and, when given, `task_id + state`.
    async fn find_by_task(
        &self,
        task_id: &TaskId,
        state: Option<RecordState>,
    ) -> Result<Vec<StubRecord>, StubStoreError>;

    async fn find_by_item(
        &self,
        task_id: &TaskId,
        item_id: &RemoteItemId,
    ) -> Result<Option<StubRecord>, StubStoreError>;
}
