//! `RedirectCache`: the pick-handle → signed-URL cache described in design note §4.5.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use gateway_core::domain::PickHandle;
use gateway_core::ports::upstream_client::{UpstreamClient, UpstreamError};

/// Default TTL applied to a freshly resolved signed URL (design note §4.5).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct CacheEntry {
    url: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Single-flight, TTL-bounded cache of resolved signed URLs.
///
/// Entries are keyed by [`PickHandle`] only: two callers resolving the same
/// handle at the same time share one upstream call via a per-handle
/// `tokio::sync::Mutex` latch kept in a second map (design note §8 property 6).
/// Failed resolutions are never cached so a subsequent call retries.
pub struct RedirectCache {
    entries: DashMap<PickHandle, CacheEntry>,
    latches: DashMap<PickHandle, Arc<Mutex<()>>>,
    ttl: Duration,
}

impl Default for RedirectCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl RedirectCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            latches: DashMap::new(),
            ttl,
        }
    }

    fn latch_for(&self, handle: &PickHandle) -> Arc<Mutex<()>> {
        self.latches.entry(handle.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Resolves `handle` to a signed URL, serving a cached entry when one is
    /// still fresh and otherwise calling `client.resolve_signed_url` under a
    /// per-handle latch so concurrent misses coalesce into one upstream call.
    pub async fn get(
        &self,
        client: &dyn UpstreamClient,
        handle: &PickHandle,
        user_agent: Option<&str>,
    ) -> Result<String, UpstreamError> {
        if let Some(entry) = self.entries.get(handle) {
            if !entry.is_expired() {
                return Ok(entry.url.clone());
            }
        }

        let latch = self.latch_for(handle);
        let _guard = latch.lock().await;

        // Another caller may have populated the entry while we waited for
        // the latch; re-check before calling upstream again.
        if let Some(entry) = self.entries.get(handle) {
            if !entry.is_expired() {
                return Ok(entry.url.clone());
            }
        }

        let url = client.resolve_signed_url(handle, user_agent).await?;
        let entry = CacheEntry { url: url.clone(), expires_at: Utc::now() + self.ttl };
        self.entries.insert(handle.clone(), entry);
        self.latches.remove(handle);
        debug!(%handle, "resolved and cached signed url");
        Ok(url)
    }

    /// Drops expired entries. Correctness does not depend on this running;
    /// callers may invoke it periodically to bound memory.
    pub fn sweep_expired(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}
