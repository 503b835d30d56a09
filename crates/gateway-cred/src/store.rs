//! File-backed implementation of `gateway_core::ports::CredentialStore`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;

use gateway_core::domain::{Credential, DriveId};
use gateway_core::ports::{CredentialError, CredentialStore};

/// Credential store backed by one JSON file per drive.
///
/// Concurrent calls for the *same* drive are serialised through a per-drive
/// `tokio::sync::Mutex` kept in a `DashMap`, matching design note §4.1's "concurrent
/// calls on the same drive are serialised by the store". Calls for
/// different drives never contend.
pub struct FileCredentialStore {
    root: PathBuf,
    locks: DashMap<DriveId, Arc<Mutex<()>>>,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into().join("credentials"),
            locks: DashMap::new(),
        }
    }

    fn path_for(&self, drive_id: &DriveId) -> PathBuf {
        self.root.join(format!("{drive_id}.json"))
    }

    fn lock_for(&self, drive_id: &DriveId) -> Arc<Mutex<()>> {
        self.locks
            .entry(drive_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CredentialError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CredentialError::Io(e.into()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| CredentialError::Io(e.into()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| CredentialError::Io(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn save(&self, drive_id: &DriveId, credential: &Credential) -> Result<(), CredentialError> {
        let lock = self.lock_for(drive_id);
        let _guard = lock.lock().await;

        let bytes = serde_json::to_vec_pretty(credential)
            .map_err(|e| CredentialError::Corrupt(e.to_string()))?;
        Self::write_atomic(&self.path_for(drive_id), &bytes).await?;
        tracing::info!(%drive_id, "credential saved");
        Ok(())
    }

    async fn load(&self, drive_id: &DriveId) -> Result<Credential, CredentialError> {
        let lock = self.lock_for(drive_id);
        let _guard = lock.lock().await;

        let path = self.path_for(drive_id);
        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CredentialError::NotFound(drive_id.clone())
            } else {
                CredentialError::Io(e.into())
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| CredentialError::Corrupt(e.to_string()))
    }

    async fn invalidate(&self, drive_id: &DriveId) -> Result<(), CredentialError> {
        let lock = self.lock_for(drive_id);
        let _guard = lock.lock().await;

        let path = self.path_for(drive_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(%drive_id, "credential invalidated");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CredentialError::Io(e.into())),
        }
    }

    async fn is_present(&self, drive_id: &DriveId) -> bool {
        tokio::fs::metadata(self.path_for(drive_id)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn bearer() -> Credential {
        Credential::Bearer {
            access_token: "tok".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc::now() + Duration::hours(2),
        }
    }

    #[tokio::test]
    async fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let drive_id = DriveId::new("drive115", 1);

        store.save(&drive_id, &bearer()).await.unwrap();
        assert!(store.is_present(&drive_id).await);
        let loaded = store.load(&drive_id).await.unwrap();
        match loaded {
            Credential::Bearer { access_token, .. } => assert_eq!(access_token, "tok"),
            _ => panic!("expected bearer credential"),
        }
    }

    #[tokio::test]
    async fn load_missing_drive_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let err = store.load(&DriveId::new("drive115", 2)).await.unwrap_err();
        assert!(matches!(err, CredentialError::NotFound(_)));
    }

    #[tokio::test]
    async fn invalidate_removes_the_blob_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let drive_id = DriveId::new("drive115", 3);

        store.save(&drive_id, &bearer()).await.unwrap();
        store.invalidate(&drive_id).await.unwrap();
        assert!(!store.is_present(&drive_id).await);
        // idempotent: invalidating an already-absent credential is fine
        store.invalidate(&drive_id).await.unwrap();
    }

    #[tokio::test]
    async fn save_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        let drive_id = DriveId::new("drive115", 4);

        store.save(&drive_id, &bearer()).await.unwrap();
        let second = Credential::Bearer {
            access_token: "tok2".into(),
            refresh_token: "refresh2".into(),
            expires_at: Utc::now() + Duration::hours(1),
        };
        store.save(&drive_id, &second).await.unwrap();

        let loaded = store.load(&drive_id).await.unwrap();
        match loaded {
            Credential::Bearer { access_token, .. } => assert_eq!(access_token, "tok2"),
            _ => panic!("expected bearer credential"),
        }
    }
}
