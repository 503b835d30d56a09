//! HTTP surface: the JSON API and the `.strm` redirect endpoint.
//!
//! Route table and `{error, status}` response shape follow the service
//! contract; the `AppState`-plus-`create_app(state) -> Router` structure
//! and the `TraceLayer`/`CorsLayer::permissive()` pair are grounded on
//! `Lowband21-ferrex/server/src/main.rs`, the only `axum` server in the
//! retrieval pack.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path as AxPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use gateway_core::domain::{
    Credential, Drive, DriveId, DriveKind, PickHandle, RemoteItemId, Task, TaskId,
};
use gateway_core::ports::{CredentialError, CredentialStore, TaskRegistryError, UpstreamError};
use gateway_core::pool::PoolError;
use gateway_drive115::auth::AuthError;
use gateway_store::drive_store::DriveStoreError;
use gateway_sync::{EngineError, SchedulerError};

use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/stream/:pick_handle", get(stream_redirect))
        .route("/api/download/:pick_handle", get(download_url))
        .route("/api/list", get(list_children))
        .route("/api/search", get(search_items))
        .route("/api/auth/qrcode", get(auth_qrcode))
        .route("/api/auth/status", get(auth_status))
        .route("/api/auth/exchange", post(auth_exchange))
        .route("/api/drives", get(list_drives).post(create_drive))
        .route("/api/drives/:drive_id", get(get_drive).delete(delete_drive))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/:task_id", get(get_task).put(update_task).delete(delete_task))
        .route("/api/tasks/:task_id/execute", post(execute_task))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

type SharedState = State<Arc<AppState>>;

/// Uniform non-2xx error body (design note §7): `{"error": "...", "status": n}`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

enum ApiError {
    Unauthenticated(String),
    NotFound(String),
    Validation(String),
    Conflict(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthenticated(m) => (StatusCode::UNAUTHORIZED, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { error: message, status: status.as_u16() })).into_response()
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Unauthenticated(drive_id) => {
                ApiError::Unauthenticated(format!("drive {drive_id} has no credential on file"))
            }
            PoolError::Credential(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unauth => ApiError::Unauthenticated("upstream authentication expired".into()),
            UpstreamError::NotFound(id) => ApiError::NotFound(format!("upstream item not found: {id}")),
            UpstreamError::RateLimited { .. } | UpstreamError::Transport(_) | UpstreamError::Upstream { .. } => {
                ApiError::Upstream(err.to_string())
            }
        }
    }
}

impl From<TaskRegistryError> for ApiError {
    fn from(err: TaskRegistryError) -> Self {
        match err {
            TaskRegistryError::NotFound(id) => ApiError::NotFound(format!("task not found: {id}")),
            TaskRegistryError::Validation(e) => ApiError::Validation(e.to_string()),
            TaskRegistryError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DriveStoreError> for ApiError {
    fn from(err: DriveStoreError) -> Self {
        match err {
            DriveStoreError::NotFound(id) => ApiError::NotFound(format!("drive not found: {id}")),
            DriveStoreError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NotFound(drive_id) => {
                ApiError::Unauthenticated(format!("drive {drive_id} has no credential on file"))
            }
            CredentialError::Io(e) => ApiError::Internal(e.to_string()),
            CredentialError::Corrupt(m) => ApiError::Internal(m),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::SessionNotFound => ApiError::NotFound("auth session not found".into()),
            AuthError::SessionExpired => ApiError::Validation("auth session expired".into()),
            AuthError::NotConfirmed => ApiError::Conflict("qr code not yet confirmed".into()),
            AuthError::Transport(m) => ApiError::Upstream(m),
            AuthError::Upstream { message, .. } => ApiError::Upstream(message),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::TaskRegistry(e) => e.into(),
            EngineError::StubStore(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Conflict(task_id) => ApiError::Conflict(format!("task {task_id} is already running")),
            SchedulerError::Engine(e) => e.into(),
        }
    }
}

fn parse_drive_id(raw: &str) -> Result<DriveId, ApiError> {
    DriveId::from_str(raw).map_err(|e| ApiError::Validation(e.to_string()))
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    TaskId::from_str(raw).map_err(|e| ApiError::Validation(e.to_string()))
}

// --- GET /stream/:pick_handle ---------------------------------------------

#[derive(Deserialize)]
struct DriveQuery {
    drive_id: String,
}

async fn stream_redirect(
    State(state): SharedState,
    AxPath(pick_handle): AxPath<String>,
    Query(query): Query<DriveQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let drive_id = parse_drive_id(&query.drive_id)?;
    let handle = PickHandle::new(pick_handle);
    let url = resolve_url(&state, &drive_id, &handle, &headers).await?;
    Ok(Redirect::temporary(&url).into_response())
}

// --- GET /api/download/:pick_handle ---------------------------------------

#[derive(Serialize)]
struct DownloadResponse {
    url: String,
}

async fn download_url(
    State(state): SharedState,
    AxPath(pick_handle): AxPath<String>,
    Query(query): Query<DriveQuery>,
    headers: HeaderMap,
) -> Result<Json<DownloadResponse>, ApiError> {
    let drive_id = parse_drive_id(&query.drive_id)?;
    let handle = PickHandle::new(pick_handle);
    let url = resolve_url(&state, &drive_id, &handle, &headers).await?;
    Ok(Json(DownloadResponse { url }))
}

async fn resolve_url(
    state: &AppState,
    drive_id: &DriveId,
    handle: &PickHandle,
    headers: &HeaderMap,
) -> Result<String, ApiError> {
    let entry = state.pool.acquire(drive_id).await?;
    let user_agent = headers.get(axum::http::header::USER_AGENT).and_then(|v| v.to_str().ok());

    match state.redirect_cache.get(entry.client.as_ref(), handle, user_agent).await {
        Ok(url) => Ok(url),
        Err(UpstreamError::Unauth) => {
            let _ = state.pool.invalidate(drive_id).await;
            Err(ApiError::Unauthenticated("upstream authentication expired".into()))
        }
        Err(err) => Err(err.into()),
    }
}

// --- GET /api/list ----------------------------------------------------------

#[derive(Deserialize)]
struct ListQuery {
    drive_id: String,
    #[serde(default)]
    cid: Option<String>,
    #[serde(default)]
    offset: u64,
    #[serde(default = "default_page_limit")]
    limit: u64,
}

fn default_page_limit() -> u64 {
    100
}

#[derive(Serialize)]
struct ListResponse {
    items: Vec<gateway_core::domain::RemoteItem>,
    total: u64,
}

async fn list_children(
    State(state): SharedState,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let drive_id = parse_drive_id(&query.drive_id)?;
    let entry = state.pool.acquire(&drive_id).await?;
    let folder_id = query.cid.map(RemoteItemId::from);

    match entry.client.list_children(folder_id.as_ref(), query.offset, query.limit).await {
        Ok(page) => Ok(Json(ListResponse { items: page.items, total: page.total })),
        Err(UpstreamError::Unauth) => {
            let _ = state.pool.invalidate(&drive_id).await;
            Err(ApiError::Unauthenticated("upstream authentication expired".into()))
        }
        Err(err) => Err(err.into()),
    }
}

// --- GET /api/search ---------------------------------------------------------

#[derive(Deserialize)]
struct SearchQuery {
    drive_id: String,
    keyword: String,
    #[serde(default)]
    cid: Option<String>,
    #[serde(default = "default_page_limit")]
    limit: u64,
}

async fn search_items(
    State(state): SharedState,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<gateway_core::domain::RemoteItem>>, ApiError> {
    let drive_id = parse_drive_id(&query.drive_id)?;
    let entry = state.pool.acquire(&drive_id).await?;
    let folder_id = query.cid.map(RemoteItemId::from);

    match entry.client.search(folder_id.as_ref(), &query.keyword, query.limit).await {
        Ok(items) => Ok(Json(items)),
        Err(UpstreamError::Unauth) => {
            let _ = state.pool.invalidate(&drive_id).await;
            Err(ApiError::Unauthenticated("upstream authentication expired".into()))
        }
        Err(err) => Err(err.into()),
    }
}

// --- Auth: device-grant QR login --------------------------------------------

async fn auth_qrcode(
    State(state): SharedState,
) -> Result<Json<gateway_core::domain::AuthSession>, ApiError> {
    let session = state.auth_flow.begin().await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
struct AuthStatusQuery {
    uid: String,
}

async fn auth_status(
    State(state): SharedState,
    Query(query): Query<AuthStatusQuery>,
) -> Result<Json<gateway_core::domain::AuthSession>, ApiError> {
    let session_id = gateway_core::domain::SessionId::new(query.uid);
    let session = state.auth_flow.poll(&session_id).await?;
    Ok(Json(session))
}

#[derive(Deserialize)]
struct AuthExchangeRequest {
    uid: String,
    drive_name: String,
}

async fn auth_exchange(
    State(state): SharedState,
    Json(body): Json<AuthExchangeRequest>,
) -> Result<Json<Drive>, ApiError> {
    let session_id = gateway_core::domain::SessionId::new(body.uid);
    let credential = state.auth_flow.exchange(&session_id).await?;

    let drive_id = DriveId::new("drive115", now_millis());
    state.credential_store.save(&drive_id, &credential).await?;

    let drive = state.drive_store.create(Drive::new(drive_id, body.drive_name, DriveKind::Drive115)).await?;
    Ok(Json(drive))
}

fn now_millis() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// --- Drives CRUD -------------------------------------------------------------

async fn list_drives(State(state): SharedState) -> Result<Json<Vec<Drive>>, ApiError> {
    Ok(Json(state.drive_store.list().await?))
}

#[derive(Deserialize)]
struct CreateDriveRequest {
    name: String,
    credential: Credential,
}

async fn create_drive(
    State(state): SharedState,
    Json(body): Json<CreateDriveRequest>,
) -> Result<Json<Drive>, ApiError> {
    let drive_id = DriveId::new("drive115", now_millis());
    state.credential_store.save(&drive_id, &body.credential).await?;
    let drive = state.drive_store.create(Drive::new(drive_id, body.name, DriveKind::Drive115)).await?;
    Ok(Json(drive))
}

async fn get_drive(State(state): SharedState, AxPath(drive_id): AxPath<String>) -> Result<Json<Drive>, ApiError> {
    let drive_id = parse_drive_id(&drive_id)?;
    Ok(Json(state.drive_store.get(&drive_id).await?))
}

async fn delete_drive(State(state): SharedState, AxPath(drive_id): AxPath<String>) -> Result<StatusCode, ApiError> {
    let drive_id = parse_drive_id(&drive_id)?;
    state.drive_store.delete(&drive_id).await?;
    state.pool.evict(&drive_id);
    let _ = state.credential_store.invalidate(&drive_id).await;
    Ok(StatusCode::NO_CONTENT)
}

// --- Tasks CRUD ---------------------------------------------------------------

async fn list_tasks(State(state): SharedState) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(state.task_registry.list_all().await?))
}

async fn create_task(State(state): SharedState, Json(task): Json<Task>) -> Result<Json<Task>, ApiError> {
    let created = state.task_registry.create(task).await?;
    state.scheduler.add(&created);
    if created.watch.enabled {
        state.spawn_watcher(created.task_id, std::time::Duration::from_secs(u64::from(created.watch.poll_period_seconds)));
    }
    Ok(Json(created))
}

async fn get_task(State(state): SharedState, AxPath(task_id): AxPath<String>) -> Result<Json<Task>, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    Ok(Json(state.task_registry.get(&task_id).await?))
}

async fn update_task(
    State(state): SharedState,
    AxPath(task_id): AxPath<String>,
    Json(task): Json<Task>,
) -> Result<Json<Task>, ApiError> {
    let parsed_id = parse_task_id(&task_id)?;
    if task.task_id != parsed_id {
        return Err(ApiError::Validation("task id in body does not match path".into()));
    }
    let updated = state.task_registry.update(task).await?;
    state.scheduler.add(&updated);
    Ok(Json(updated))
}

async fn delete_task(State(state): SharedState, AxPath(task_id): AxPath<String>) -> Result<StatusCode, ApiError> {
    let task_id = parse_task_id(&task_id)?;
    state.scheduler.remove(&task_id);
    state.watcher_registry.remove(&task_id).await;
    state.task_registry.delete(&task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn execute_task(
    State(state): SharedState,
    AxPath(task_id): AxPath<String>,
) -> Result<(StatusCode, Json<gateway_core::domain::RunLog>), ApiError> {
    let task_id = parse_task_id(&task_id)?;
    let log = state.scheduler.run_now(&task_id).await?;
    Ok((StatusCode::ACCEPTED, Json(log)))
}
