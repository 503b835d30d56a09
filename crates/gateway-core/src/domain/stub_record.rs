//! StubRecord domain entity
//!
//! One row per generated stub: a snapshot of the remote item's fields at
//! write time plus the local path and contents written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{RecordId, RemoteItemId, TaskId};

/// Whether a stub record still corresponds to a file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Active,
    Deleted,
}

/// A persisted stub record: `(task_id, item_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubRecord {
    pub task_id: TaskId,
    pub item_id: RemoteItemId,
    pub file_name: String,
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
    pub stub_path: String,
    pub stub_contents: String,
    pub state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StubRecord {
    #[must_use]
    pub fn record_id(&self) -> RecordId {
        RecordId::new(self.task_id.clone(), self.item_id.clone())
    }

    /// Marks this record deleted, matching design note §4.6's `mark_deleted`.
    pub fn mark_deleted(&mut self) {
        self.state = RecordState::Deleted;
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, RecordState::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StubRecord {
        let now = Utc::now();
        StubRecord {
            task_id: TaskId::new(),
            item_id: RemoteItemId::from("1"),
            file_name: "a.mp4".into(),
            size: Some(10),
            modified_at: Some(now),
            stub_path: "/d/a.strm".into(),
            stub_contents: "stream://drive115/p1".into(),
            state: RecordState::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn mark_deleted_flips_state() {
        let mut record = sample();
        record.mark_deleted();
        assert!(!record.is_active());
        assert_eq!(record.state, RecordState::Deleted);
    }
}
