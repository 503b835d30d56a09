//! Upstream Client port (C2)
//!
//! The boundary between the sync engine and a concrete cloud backend. One
//! implementation lives in `gateway-drive115`; the trait is written so a
//! second provider could be added without touching `gateway-sync`.

use async_trait::async_trait;
use futures_core::stream::BoxStream;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::{EventCursor, PickHandle, RemoteItem, RemoteItemId, UpstreamEvent};

/// Failure modes an upstream client can surface to its caller.
///
/// Retryable-ness is a property of the variant (design note §9): callers branch on
/// `RateLimited` to back off, on `Unauth` to tear down the pool entry, and
/// treat everything else as a per-call failure.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream authentication expired or was revoked")]
    Unauth,

    #[error("upstream item not found: {0}")]
    NotFound(RemoteItemId),

    #[error("upstream rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream error {code}: {message}")]
    Upstream { code: i64, message: String },
}

/// One page of children plus the total count the upstream reports for the
/// folder, for callers that paginate a browse UI.
#[derive(Debug, Clone)]
pub struct ChildPage {
    pub items: Vec<RemoteItem>,
    pub total: u64,
}

/// One page of the event feed plus the cursor to resume from.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<UpstreamEvent>,
    pub new_cursor: EventCursor,
}

/// Read-only operations against the upstream cloud backend.
///
/// Implementors own rate limiting and retry for transient failures;
/// callers only need to handle `UpstreamError::RateLimited` as a signal to
/// back off at the call site (design note §4.2, §4.7).
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Lists one page of direct children. `folder_id == None` means root.
    async fn list_children(
        &self,
        folder_id: Option<&RemoteItemId>,
        offset: u64,
        limit: u64,
    ) -> Result<ChildPage, UpstreamError>;

    /// Breadth-first enumeration of an entire subtree, yielding items paired
    /// with their path relative to `folder_id`. Lazy: the walker (C7) drives
    /// this stream and may stop consuming it early.
    fn iter_subtree(
        &self,
        folder_id: Option<RemoteItemId>,
    ) -> BoxStream<'static, Result<(RemoteItem, PathBuf), UpstreamError>>;

    /// Fetches metadata for a single item.
    async fn get_item(&self, item_id: &RemoteItemId) -> Result<RemoteItem, UpstreamError>;

    /// Keyword search, optionally scoped to a folder.
    async fn search(
        &self,
        folder_id: Option<&RemoteItemId>,
        keyword: &str,
        limit: u64,
    ) -> Result<Vec<RemoteItem>, UpstreamError>;

    /// Resolves a pick handle to a time-limited, publicly fetchable URL.
    /// Single call, no caching at this layer — that is the Redirect Cache's
    /// job (C5).
    async fn resolve_signed_url(
        &self,
        handle: &PickHandle,
        user_agent: Option<&str>,
    ) -> Result<String, UpstreamError>;

    /// Lists events strictly newer than `since`, oldest first, up to
    /// `limit` entries. Callers paginate by feeding `new_cursor` back in.
    async fn list_events(
        &self,
        since: Option<EventCursor>,
        limit: u64,
    ) -> Result<EventPage, UpstreamError>;
}
