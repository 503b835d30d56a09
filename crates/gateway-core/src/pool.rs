//! Provider Pool (C4)
//!
//! Wraps each drive's upstream client in a mutex for interior mutability,
//! keyed by drive in a `DashMap` since this gateway is multi-tenant. Reads
//! never take a global lock; only entry *creation* is serialised, and only
//! for the drive being created.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::domain::{Credential, DriveId};
use crate::ports::{CredentialError, CredentialStore, UpstreamClient};

/// One live entry in the pool: a constructed client plus the credential it
/// was built from and when that credential was last confirmed good.
pub struct PoolEntry {
    pub client: Arc<dyn UpstreamClient>,
    pub credential: Credential,
    pub last_checked: Instant,
}

impl std::fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolEntry")
            .field("client", &"<dyn UpstreamClient>")
            .field("credential", &self.credential)
            .field("last_checked", &self.last_checked)
            .finish()
    }
}

impl Clone for PoolEntry {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            credential: self.credential.clone(),
            last_checked: self.last_checked,
        }
    }
}

/// A factory that turns a loaded credential into a concrete upstream
/// client. Implemented by `gateway-drive115`; injected here so
/// `gateway-core` never depends on a concrete provider crate.
pub trait ClientFactory: Send + Sync {
    fn build(&self, drive_id: &DriveId, credential: &Credential) -> Arc<dyn UpstreamClient>;
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no credential on file for drive {0}, authenticate first")]
    Unauthenticated(DriveId),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// In-memory `drive_id -> Entry` map with get-or-create semantics (spec
/// §4.4). Concurrency-safe: `DashMap` gives lock-free reads across drives,
/// and a per-drive `tokio::sync::Mutex` serialises only concurrent
/// first-time creation of the same drive's entry.
pub struct ProviderPool {
    entries: DashMap<DriveId, PoolEntry>,
    creation_locks: DashMap<DriveId, Arc<Mutex<()>>>,
    credential_store: Arc<dyn CredentialStore>,
    client_factory: Arc<dyn ClientFactory>,
}

impl ProviderPool {
    #[must_use]
    pub fn new(
        credential_store: Arc<dyn CredentialStore>,
        client_factory: Arc<dyn ClientFactory>,
    ) -> Self {
        Self {
            entries: DashMap::new(),
            creation_locks: DashMap::new(),
            credential_store,
            client_factory,
        }
    }

    /// Returns the live entry for `drive_id`, constructing it from the
    /// persisted credential on first use.
    pub async fn acquire(&self, drive_id: &DriveId) -> Result<PoolEntry, PoolError> {
        if let Some(entry) = self.entries.get(drive_id) {
            return Ok(entry.clone());
        }

        let lock = self
            .creation_locks
            .entry(drive_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check: another task may have finished creating it while we waited.
        if let Some(entry) = self.entries.get(drive_id) {
            return Ok(entry.clone());
        }

        let credential = self
            .credential_store
            .load(drive_id)
            .await
            .map_err(|e| match e {
                CredentialError::NotFound(_) => PoolError::Unauthenticated(drive_id.clone()),
                other => PoolError::Credential(other),
            })?;

        let client = self.client_factory.build(drive_id, &credential);
        let entry = PoolEntry {
            client,
            credential,
            last_checked: Instant::now(),
        };
        self.entries.insert(drive_id.clone(), entry.clone());
        tracing::debug!(%drive_id, "provider pool entry created");
        Ok(entry)
    }

    /// Clears the in-memory entry and the persisted credential for
    /// `drive_id`. Called whenever a caller observes `UpstreamError::Unauth`
    /// (design note §4.4, §4.7).
    pub async fn invalidate(&self, drive_id: &DriveId) -> Result<(), PoolError> {
        self.entries.remove(drive_id);
        self.credential_store.invalidate(drive_id).await?;
        tracing::info!(%drive_id, "provider pool entry invalidated");
        Ok(())
    }

    /// Drops the in-memory entry only, e.g. on drive deletion where the
    /// credential blob is removed by the caller separately.
    pub fn evict(&self, drive_id: &DriveId) {
        self.entries.remove(drive_id);
        self.creation_locks.remove(drive_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeClient;

    #[async_trait]
    impl UpstreamClient for FakeClient {
        async fn list_children(
            &self,
            _folder_id: Option<&crate::domain::RemoteItemId>,
            _offset: u64,
            _limit: u64,
        ) -> Result<crate::ports::ChildPage, crate::ports::UpstreamError> {
            unimplemented!()
        }

        fn iter_subtree(
            &self,
            _folder_id: Option<crate::domain::RemoteItemId>,
        ) -> futures_core::stream::BoxStream<
            'static,
            Result<(crate::domain::RemoteItem, std::path::PathBuf), crate::ports::UpstreamError>,
        > {
            unimplemented!()
        }

        async fn get_item(
            &self,
            _item_id: &crate::domain::RemoteItemId,
        ) -> Result<crate::domain::RemoteItem, crate::ports::UpstreamError> {
            unimplemented!()
        }

        async fn search(
            &self,
            _folder_id: Option<&crate::domain::RemoteItemId>,
            _keyword: &str,
            _limit: u64,
        ) -> Result<Vec<crate::domain::RemoteItem>, crate::ports::UpstreamError> {
            unimplemented!()
        }

        async fn resolve_signed_url(
            &self,
            _handle: &crate::domain::PickHandle,
            _user_agent: Option<&str>,
        ) -> Result<String, crate::ports::UpstreamError> {
            unimplemented!()
        }

        async fn list_events(
            &self,
            _since: Option<crate::domain::EventCursor>,
            _limit: u64,
        ) -> Result<crate::ports::EventPage, crate::ports::UpstreamError> {
            unimplemented!()
        }
    }

    struct FakeFactory {
        builds: AtomicUsize,
    }

    impl ClientFactory for FakeFactory {
        fn build(&self, _drive_id: &DriveId, _credential: &Credential) -> Arc<dyn UpstreamClient> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Arc::new(FakeClient)
        }
    }

    struct FakeCredentialStore {
        credential: tokio::sync::Mutex<Option<Credential>>,
    }

    #[async_trait]
    impl CredentialStore for FakeCredentialStore {
        async fn save(
            &self,
            _drive_id: &DriveId,
            credential: &Credential,
        ) -> Result<(), CredentialError> {
            *self.credential.lock().await = Some(credential.clone());
            Ok(())
        }

        async fn load(&self, drive_id: &DriveId) -> Result<Credential, CredentialError> {
            self.credential
                .lock()
                .await
                .clone()
                .ok_or_else(|| CredentialError::NotFound(drive_id.clone()))
        }

        async fn invalidate(&self, _drive_id: &DriveId) -> Result<(), CredentialError> {
            *self.credential.lock().await = None;
            Ok(())
        }

        async fn is_present(&self, _drive_id: &DriveId) -> bool {
            self.credential.lock().await.is_some()
        }
    }

    fn bearer_credential() -> Credential {
        Credential::Bearer {
            access_token: "tok".into(),
            refresh_token: "refresh".into(),
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn acquire_is_unauthenticated_without_a_credential() {
        let store = Arc::new(FakeCredentialStore {
            credential: tokio::sync::Mutex::new(None),
        });
        let factory = Arc::new(FakeFactory {
            builds: AtomicUsize::new(0),
        });
        let pool = ProviderPool::new(store, factory);
        let err = pool.acquire(&DriveId::new("drive115", 1)).await.unwrap_err();
        assert!(matches!(err, PoolError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn acquire_builds_once_and_reuses_entry() {
        let store = Arc::new(FakeCredentialStore {
            credential: tokio::sync::Mutex::new(Some(bearer_credential())),
        });
        let factory = Arc::new(FakeFactory {
            builds: AtomicUsize::new(0),
        });
        let pool = ProviderPool::new(store, factory.clone());
        let drive_id = DriveId::new("drive115", 2);
        pool.acquire(&drive_id).await.unwrap();
        pool.acquire(&drive_id).await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_clears_entry_and_credential() {
        let store = Arc::new(FakeCredentialStore {
            credential: tokio::sync::Mutex::new(Some(bearer_credential())),
        });
        let factory = Arc::new(FakeFactory {
            builds: AtomicUsize::new(0),
        });
        let pool = ProviderPool::new(store.clone(), factory.clone());
        let drive_id = DriveId::new("drive115", 3);
        pool.acquire(&drive_id).await.unwrap();
        pool.invalidate(&drive_id).await.unwrap();
        assert!(!store.is_present(&drive_id).await);
        let err = pool.acquire(&drive_id).await.unwrap_err();
        assert!(matches!(err, PoolError::Unauthenticated(_)));
    }
}
