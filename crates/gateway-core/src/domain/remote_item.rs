//! RemoteItem value object
//!
//! Not persisted: produced by `UpstreamClient` calls, consumed by the Sync
//! Engine and the HTTP surface. Distinguishes folder vs file by a tagged
//! variant instead of a runtime string/integer tag (design note §9's sum-type
//! redesign note).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{PickHandle, RemoteItemId};

/// Whether a `RemoteItem` is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Folder,
}

/// A single node in the upstream's remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    pub id: RemoteItemId,
    pub name: String,
    pub kind: ItemKind,
    /// Size in bytes; `None` for folders.
    pub size: Option<u64>,
    pub parent_id: Option<RemoteItemId>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Opaque handle used to resolve a signed URL. Present on files only.
    pub pick_handle: Option<PickHandle>,
    pub content_hash: Option<String>,
}

impl RemoteItem {
    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder)
    }

    /// File extension in lowercase, without the leading dot. `None` for
    /// folders and extensionless names.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        if self.is_folder() {
            return None;
        }
        std::path::Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> RemoteItem {
        RemoteItem {
            id: RemoteItemId::from("1"),
            name: name.to_string(),
            kind: ItemKind::File,
            size: Some(10),
            parent_id: None,
            modified_at: None,
            pick_handle: Some(PickHandle::new("p1")),
            content_hash: None,
        }
    }

    #[test]
    fn extension_is_lowercased() {
        let item = file("Movie.MP4");
        assert_eq!(item.extension().as_deref(), Some("mp4"));
    }

    #[test]
    fn folders_have_no_extension() {
        let mut item = file("Videos");
        item.kind = ItemKind::Folder;
        assert_eq!(item.extension(), None);
        assert!(item.is_folder());
    }

    #[test]
    fn extensionless_files_return_none() {
        let item = file("README");
        assert_eq!(item.extension(), None);
    }
}
