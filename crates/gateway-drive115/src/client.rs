//! 115 open-platform API client
//!
//! Implements `gateway_core::ports::UpstreamClient` (C2) against 115's
//! `proapi.115.com` REST surface. Request/retry plumbing is a `request()`
//! builder helper feeding an `execute_with_retry` proactive-limiter-plus-
//! 429-backoff loop.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gateway_drive115::client::Drive115Client;
//!
//! # async fn example() {
//! let client = Drive115Client::new("access-token-here");
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_core::stream::BoxStream;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use gateway_core::domain::{ItemKind, PickHandle, RemoteItem, RemoteItemId, UpstreamEvent};
use gateway_core::ports::upstream_client::{ChildPage, EventPage, UpstreamClient, UpstreamError};
use gateway_core::domain::EventCursor;

use crate::rate_limit::{parse_retry_after, RateLimiter, RateLimitConfig};

const BASE_URL: &str = "https://proapi.115.com";

const FILE_LIST_PATH: &str = "/open/ufile/files";
const SEARCH_PATH: &str = "/open/ufile/search";
const DOWNLOAD_PATH: &str = "/open/ufile/downurl";
const FOLDER_INFO_PATH: &str = "/open/folder/get_info";
const LIFE_BEHAVIOR_PATH: &str = "/android/2.0/life/behavior_detail";

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// One row of `data` in a `GET /open/ufile/files` or `.../search` response.
#[derive(Debug, Deserialize)]
struct FileRow {
    fid: Option<String>,
    cid: Option<String>,
    pid: Option<String>,
    #[serde(rename = "fn")]
    file_name: Option<String>,
    #[serde(rename = "fc")]
    is_file_flag: Option<String>,
    fs: Option<i64>,
    pc: Option<String>,
    sha1: Option<String>,
    /// Unix seconds, as a string on the wire.
    te: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    state: bool,
    message: Option<String>,
    code: Option<i64>,
    data: Option<Vec<FileRow>>,
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FolderInfoResponse {
    state: bool,
    message: Option<String>,
    code: Option<i64>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    state: bool,
    message: Option<String>,
    code: Option<i64>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LifeBehaviorResponse {
    state: bool,
    message: Option<String>,
    code: Option<i64>,
    data: Option<LifeBehaviorData>,
}

#[derive(Debug, Deserialize)]
struct LifeBehaviorData {
    #[serde(default)]
    list: Vec<LifeBehaviorRow>,
}

#[derive(Debug, Deserialize)]
struct LifeBehaviorRow {
    id: i64,
    #[serde(rename = "type")]
    behavior_type: i64,
    file_id: Option<String>,
    file_name: Option<String>,
    pid: Option<String>,
    update_time: Option<i64>,
}

fn row_to_item(row: FileRow) -> Result<RemoteItem, UpstreamError> {
    let id = row
        .fid
        .or(row.cid)
        .ok_or_else(|| UpstreamError::Transport("file row missing fid/cid".into()))?;
    let is_folder = row.is_file_flag.as_deref() != Some("1");
    let modified_at = row
        .te
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    Ok(RemoteItem {
        id: RemoteItemId::from(id),
        name: row.file_name.unwrap_or_default(),
        kind: if is_folder { ItemKind::Folder } else { ItemKind::File },
        size: if is_folder { None } else { row.fs.map(|s| s.max(0) as u64) },
        parent_id: row.pid.map(RemoteItemId::from),
        modified_at,
        pick_handle: row.pc.map(PickHandle::new),
        content_hash: row.sha1,
    })
}

struct Inner {
    client: Client,
    access_token: String,
    base_url: String,
    rate_limiter: RateLimiter,
}

/// HTTP client for the 115 open-platform API.
///
/// Wraps `reqwest::Client` with bearer auth, base URL, and a per-client
/// [`RateLimiter`] enforcing 115's flat requests-per-second ceiling.
/// Cheaply `Clone`: the `iter_subtree` walk needs an owned, `'static`
/// handle to keep paging through folders across `.await` points.
#[derive(Clone)]
pub struct Drive115Client {
    inner: std::sync::Arc<Inner>,
}

impl Drive115Client {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_rate_limit(access_token, RateLimitConfig::default())
    }

    #[must_use]
    pub fn with_rate_limit(access_token: impl Into<String>, rate_limit: RateLimitConfig) -> Self {
        Self {
            inner: std::sync::Arc::new(Inner {
                client: Client::new(),
                access_token: access_token.into(),
                base_url: BASE_URL.to_string(),
                rate_limiter: RateLimiter::new(rate_limit),
            }),
        }
    }

    /// Points the client at a different host, for tests run against a
    /// mock server.
    #[must_use]
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            inner: std::sync::Arc::new(Inner {
                client: Client::new(),
                access_token: access_token.into(),
                base_url: base_url.into(),
                rate_limiter: RateLimiter::new(RateLimitConfig::default()),
            }),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        self.inner.client.request(method, url).bearer_auth(&self.inner.access_token)
    }

    /// Sends a request with proactive rate limiting and 429 retry/backoff.
    async fn send_with_retry(&self, request: RequestBuilder) -> Result<Response, UpstreamError> {
        let max_retries = self.inner.rate_limiter.max_retries();

        for attempt in 0..=max_retries {
            let _guard = self.inner.rate_limiter.acquire().await;

            let response = request
                .try_clone()
                .ok_or_else(|| UpstreamError::Transport("request body not cloneable for retry".into()))?
                .send()
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string()))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                self.inner.rate_limiter.on_throttle();
                if attempt >= max_retries {
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                        .unwrap_or(DEFAULT_RETRY_AFTER);
                    return Err(UpstreamError::RateLimited {
                        retry_after_secs: retry_after.as_secs(),
                    });
                }

                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| parse_retry_after(v, DEFAULT_RETRY_AFTER))
                    .unwrap_or(DEFAULT_RETRY_AFTER);
                info!(attempt, retry_after_ms = retry_after.as_millis(), "429 from 115, backing off");
                tokio::time::sleep(retry_after).await;
                continue;
            }

            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(UpstreamError::Unauth);
            }

            self.inner.rate_limiter.on_success();
            return Ok(response);
        }

        Err(UpstreamError::Transport("retry loop exited unexpectedly".into()))
    }

    fn classify_api_error(code: Option<i64>, message: Option<String>) -> UpstreamError {
        match code {
            Some(c) if c == 40140116 || c == 40140117 => UpstreamError::Unauth,
            Some(c) => UpstreamError::Upstream {
                code: c,
                message: message.unwrap_or_else(|| "unknown 115 API error".into()),
            },
            None => UpstreamError::Upstream {
                code: 0,
                message: message.unwrap_or_else(|| "unknown 115 API error".into()),
            },
        }
    }
}

#[async_trait]
impl UpstreamClient for Drive115Client {
    async fn list_children(&self, folder_id: Option<&RemoteItemId>, offset: u64, limit: u64) -> Result<ChildPage, UpstreamError> {
        let cid = folder_id.map(RemoteItemId::as_str).unwrap_or("0");
        let req = self
            .request(Method::GET, FILE_LIST_PATH)
            .query(&[
                ("cid", cid),
                ("limit", &limit.to_string()),
                ("offset", &offset.to_string()),
                ("o", "file_name"),
                ("asc", "1"),
                ("show_dir", "1"),
            ]);

        let response = self.send_with_retry(req).await?;
        let parsed: ListResponse = response.json().await.map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !parsed.state {
            return Err(Self::classify_api_error(parsed.code, parsed.message));
        }

        let rows = parsed.data.unwrap_or_default();
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(row_to_item(row)?);
        }

        Ok(ChildPage { items, total: parsed.count.unwrap_or(0) })
    }

    /// Breadth-first walk of everything under `folder_id` (the drive root
    /// when `None`), paging each folder with `list_children` and yielding
    /// every descendant paired with its path relative to the walk root.
    fn iter_subtree(&self, folder_id: Option<RemoteItemId>) -> BoxStream<'static, Result<(RemoteItem, PathBuf), UpstreamError>> {
        const PAGE_SIZE: u64 = 1150; // 115's per-request listing cap

        let client = self.clone();
        Box::pin(async_stream::try_stream! {
            let mut queue: std::collections::VecDeque<(Option<RemoteItemId>, PathBuf)> =
                std::collections::VecDeque::new();
            queue.push_back((folder_id, PathBuf::new()));

            while let Some((parent, prefix)) = queue.pop_front() {
                let mut offset = 0u64;
                loop {
                    let page = client.list_children(parent.as_ref(), offset, PAGE_SIZE).await?;
                    let page_len = page.items.len() as u64;

                    for item in page.items {
                        let path = prefix.join(&item.name);
                        if item.is_folder() {
                            queue.push_back((Some(item.id.clone()), path.clone()));
                        }
                        yield (item, path);
                    }

                    offset += page_len;
                    if offset >= page.total || page_len == 0 {
                        break;
                    }
                }
            }
        })
    }

    async fn get_item(&self, item_id: &RemoteItemId) -> Result<RemoteItem, UpstreamError> {
        let req = self.request(Method::GET, FOLDER_INFO_PATH).query(&[("file_id", item_id.as_str())]);

        let response = self.send_with_retry(req).await?;
        let parsed: FolderInfoResponse = response.json().await.map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !parsed.state {
            return Err(Self::classify_api_error(parsed.code, parsed.message));
        }

        let data = parsed.data.ok_or_else(|| UpstreamError::NotFound(item_id.clone()))?;
        let row: FileRow = serde_json::from_value(data).map_err(|e| UpstreamError::Transport(e.to_string()))?;
        row_to_item(row)
    }

    async fn search(&self, folder_id: Option<&RemoteItemId>, keyword: &str, limit: u64) -> Result<Vec<RemoteItem>, UpstreamError> {
        let cid = folder_id.map(RemoteItemId::as_str).unwrap_or("0");
        let req = self
            .request(Method::GET, SEARCH_PATH)
            .query(&[("search_value", keyword), ("cid", cid), ("limit", &limit.to_string())]);

        let response = self.send_with_retry(req).await?;
        let parsed: ListResponse = response.json().await.map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !parsed.state {
            return Err(Self::classify_api_error(parsed.code, parsed.message));
        }

        parsed.data.unwrap_or_default().into_iter().map(row_to_item).collect()
    }

    async fn resolve_signed_url(&self, handle: &PickHandle, user_agent: Option<&str>) -> Result<String, UpstreamError> {
        let mut req = self.request(Method::POST, DOWNLOAD_PATH).form(&[("pick_code", handle.as_str())]);
        if let Some(ua) = user_agent {
            req = req.header("User-Agent", ua);
        }

        let response = self.send_with_retry(req).await?;
        let parsed: DownloadResponse = response.json().await.map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !parsed.state {
            return Err(Self::classify_api_error(parsed.code, parsed.message));
        }

        let data = parsed.data.ok_or_else(|| UpstreamError::Transport("download response missing data".into()))?;
        data.as_object()
            .and_then(|obj| obj.values().next())
            .and_then(|pc_data| pc_data.get("url"))
            .and_then(|url_obj| url_obj.get("url"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| UpstreamError::Transport(format!("could not extract download URL for pick code {handle}")))
    }

    async fn list_events(&self, since: Option<EventCursor>, limit: u64) -> Result<EventPage, UpstreamError> {
        let offset = since.map(|c| c.0.max(0) as u64).unwrap_or(0);
        let req = self
            .request(Method::GET, LIFE_BEHAVIOR_PATH)
            .query(&[("limit", limit.to_string()), ("offset", offset.to_string())]);

        let response = self.send_with_retry(req).await?;
        let parsed: LifeBehaviorResponse = response.json().await.map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !parsed.state {
            return Err(Self::classify_api_error(parsed.code, parsed.message));
        }

        let rows = parsed.data.map(|d| d.list).unwrap_or_default();
        let mut max_id = since.unwrap_or_else(EventCursor::zero).0;
        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            max_id = max_id.max(row.id);
            events.push(UpstreamEvent {
                id: row.id,
                event_type: gateway_core::domain::EventType::from_upstream_code(row.behavior_type),
                file_id: RemoteItemId::from(row.file_id.unwrap_or_default()),
                file_name: row.file_name.unwrap_or_default(),
                parent_id: row.pid.map(RemoteItemId::from),
                occurred_at: row
                    .update_time
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                    .unwrap_or_else(Utc::now),
            });
        }

        Ok(EventPage { events, new_cursor: EventCursor(max_id) })
    }
}
