//! Credential Store port (C1)

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Credential, DriveId};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential on file for drive {0}")]
    NotFound(DriveId),

    #[error("credential storage I/O error: {0}")]
    Io(#[source] anyhow::Error),

    #[error("stored credential is malformed: {0}")]
    Corrupt(String),
}

/// Durable, per-drive credential storage.
///
/// Writes must be atomic from a reader's perspective (design note §4.1): a
/// concurrent `load` never observes a half-written file. Implementations
/// achieve this with write-to-temp-then-rename.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn save(&self, drive_id: &DriveId, credential: &Credential) -> Result<(), CredentialError>;

    async fn load(&self, drive_id: &DriveId) -> Result<Credential, CredentialError>;

    /// Removes the stored credential, if any. Idempotent.
    async fn invalidate(&self, drive_id: &DriveId) -> Result<(), CredentialError>;

    async fn is_present(&self, drive_id: &DriveId) -> bool;
}
