//! Upstream event feed types
//!
//! Reimplements the 115 "life behavior" event taxonomy as a tagged enum
//! instead of a runtime integer code, per design note §9's sum-type redesign note.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RemoteItemId;

/// One event type recognised by the gateway. Unrecognised upstream codes
/// decode to `Other(code)` so the watcher never errors on an unknown type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Upload,
    Move,
    Receive,
    NewFolder,
    Copy,
    Rename,
    Delete,
    ImageStar,
    FileStar,
    BrowseImage,
    BrowseVideo,
    BrowseAudio,
    BrowseDoc,
    FolderLabel,
    /// An upstream type code this gateway does not recognise.
    Other(i64),
}

impl EventType {
    /// Maps a raw upstream behavior-type code to an `EventType`, following
    /// the 115 `BEHAVIOR_TYPE_TO_NAME` table.
    #[must_use]
    pub fn from_upstream_code(code: i64) -> Self {
        match code {
            2 => EventType::Upload,
            5 | 6 => EventType::Move,
            14 => EventType::Receive,
            17 => EventType::NewFolder,
            18 => EventType::Copy,
            20 => EventType::Rename,
            22 => EventType::Delete,
            3 => EventType::ImageStar,
            4 => EventType::FileStar,
            7 => EventType::BrowseImage,
            8 => EventType::BrowseVideo,
            9 => EventType::BrowseAudio,
            10 => EventType::BrowseDoc,
            19 => EventType::FolderLabel,
            other => EventType::Other(other),
        }
    }

    /// The sync-triggering set from design note §4.10: events that should request
    /// a task re-sync.
    #[must_use]
    pub fn triggers_sync(self) -> bool {
        matches!(
            self,
            EventType::Upload
                | EventType::Move
                | EventType::Receive
                | EventType::NewFolder
                | EventType::Copy
                | EventType::Rename
                | EventType::Delete
        )
    }

    /// The explicitly ignored set from design note §4.10.
    #[must_use]
    pub fn is_ignored(self) -> bool {
        matches!(
            self,
            EventType::ImageStar
                | EventType::FileStar
                | EventType::BrowseImage
                | EventType::BrowseVideo
                | EventType::BrowseAudio
                | EventType::BrowseDoc
                | EventType::FolderLabel
        )
    }
}

/// One item from the upstream's event feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamEvent {
    /// Monotonic event id.
    pub id: i64,
    pub event_type: EventType,
    pub file_id: RemoteItemId,
    pub file_name: String,
    pub parent_id: Option<RemoteItemId>,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_triggers_sync_and_is_not_ignored() {
        let ev = EventType::from_upstream_code(2);
        assert_eq!(ev, EventType::Upload);
        assert!(ev.triggers_sync());
        assert!(!ev.is_ignored());
    }

    #[test]
    fn folder_label_is_ignored_and_does_not_trigger() {
        let ev = EventType::from_upstream_code(19);
        assert_eq!(ev, EventType::FolderLabel);
        assert!(ev.is_ignored());
        assert!(!ev.triggers_sync());
    }

    #[test]
    fn unknown_code_round_trips_as_other() {
        let ev = EventType::from_upstream_code(999);
        assert_eq!(ev, EventType::Other(999));
        assert!(!ev.triggers_sync());
        assert!(!ev.is_ignored());
    }

    #[test]
    fn delete_triggers_sync() {
        assert!(EventType::from_upstream_code(22).triggers_sync());
    }
}
