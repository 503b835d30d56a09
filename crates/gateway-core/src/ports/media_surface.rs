//! Media Surface port (placeholder)
//!
//! Spec §1 names an embedded FUSE driver and a read-only WebDAV view as
//! "thin projections over the provider contract" but excludes both from
//! this gateway's scope. This trait exists only so a future projection
//! adapter has a documented seam to implement against `gateway-core`'s
//! domain types; nothing in this workspace implements it.

use async_trait::async_trait;

use crate::domain::{DriveId, RemoteItem, RemoteItemId};

/// A read-only directory/file projection over a drive's remote tree.
#[async_trait]
pub trait MediaSurface: Send + Sync {
    async fn list_dir(
        &self,
        drive_id: &DriveId,
        folder_id: Option<&RemoteItemId>,
    ) -> anyhow::Result<Vec<RemoteItem>>;
}
