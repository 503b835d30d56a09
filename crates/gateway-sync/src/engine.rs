//! Sync Engine (C7)
//!
//! A one-directional remote-to-stub mirror: no conflict detection, no
//! local-change upload, just walk, diff against persisted records, and
//! apply filesystem + record writes. The six steps below are Walk, Plan,
//! Build paths and contents, Apply, Sidecars, and Finalise.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use thiserror::Error;

use gateway_audit::AuditLogger;
use gateway_core::domain::{
    PickHandle, RecordState, RemoteItem, RemoteItemId, RunCounters, RunLog, RunOutcome, StubRecord,
    Task, TaskId, TaskState,
};
use gateway_core::pool::ProviderPool;
use gateway_core::ports::{
    StubStore, StubStoreError, TaskRegistry, TaskRegistryError, UpstreamClient, UpstreamError,
};

/// Extensions that are always copied alongside a matched media file when
/// `copy_sidecars` is set (design note §4.7 step 5).
const SIDECAR_EXTS: &[&str] = &["nfo", "srt", "ass", "sub", "ssa", "idx", "vtt", "sup"];

/// Image extensions that are only copied when the stem names a known
/// artwork role.
const SIDECAR_IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png"];

/// Artwork role names checked as a case-insensitive substring of the stem.
const SIDECAR_IMAGE_STEMS: &[&str] = &[
    "poster", "fanart", "banner", "thumb", "logo", "clearart", "landscape", "disc", "folder",
    "backdrop",
];

/// Only `DriveKind::Drive115` exists today; the placeholder stub scheme
/// (design note §4.7 step 3) still needs a kind tag, so it is fixed here rather
/// than threading a drive-store dependency into the engine for one string.
const PLACEHOLDER_DRIVE_KIND: &str = "drive115";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    TaskRegistry(#[from] TaskRegistryError),

    #[error(transparent)]
    StubStore(#[from] StubStoreError),
}

enum PlannedAction {
    Create { item: RemoteItem, stub_path: PathBuf },
    Update { item: RemoteItem, stub_path: PathBuf, old_record: StubRecord },
    Delete { record: StubRecord },
}

enum ApplyOutcome {
    Created,
    Updated,
    Deleted,
}

enum ApplyError {
    Unauth,
    Other { item_id: String, message: String },
}

/// Runs tasks against a `ProviderPool`-acquired upstream client, persisting
/// results through the `StubStore` and `TaskRegistry` ports.
pub struct SyncEngine {
    pool: Arc<ProviderPool>,
    stub_store: Arc<dyn StubStore>,
    task_registry: Arc<dyn TaskRegistry>,
    http: reqwest::Client,
    audit: Arc<AuditLogger>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(
        pool: Arc<ProviderPool>,
        stub_store: Arc<dyn StubStore>,
        task_registry: Arc<dyn TaskRegistry>,
        http: reqwest::Client,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self { pool, stub_store, task_registry, http, audit }
    }

    /// Executes one full run of `task_id`, start to finish, and appends the
    /// resulting `RunLog`. Only infrastructure failures (task registry or
    /// stub store I/O) propagate as `Err`; every upstream or per-item
    /// failure is captured in the returned log instead.
    pub async fn run_task(&self, task_id: &TaskId) -> Result<RunLog, EngineError> {
        let mut task = self.task_registry.get(task_id).await?;
        let started_at = Utc::now();
        task.state = TaskState::Running;
        task.clear_progress();
        self.task_registry.update(task.clone()).await?;
        self.audit.log_run_started(*task_id).await;

        let mut log = RunLog {
            task_id: *task_id,
            started_at,
            ended_at: started_at,
            outcome: RunOutcome::Success,
            counters: RunCounters::default(),
            item_errors: Vec::new(),
            fatal_message: None,
        };
        let mut fatal_message: Option<String> = None;

        let entry = match self.pool.acquire(&task.drive_id).await {
            Ok(entry) => Some(entry),
            Err(err) => {
                fatal_message = Some(err.to_string());
                None
            }
        };

        if let Some(entry) = entry {
            let client = entry.client;

            // Step 1: Walk.
            let mut kept: Vec<(RemoteItem, PathBuf)> = Vec::new();
            let mut media_folders: HashMap<RemoteItemId, PathBuf> = HashMap::new();
            let mut unauth = false;

            {
                let mut stream = client.iter_subtree(Some(task.source_root_id.clone()));
                while let Some(next) = stream.next().await {
                    match next {
                        Ok((item, relpath)) => {
                            if item.is_folder() {
                                continue;
                            }
                            log.counters.scanned += 1;
                            if task.filter.keeps_extension(item.extension().as_deref()) {
                                let parent =
                                    item.parent_id.clone().unwrap_or_else(|| task.source_root_id.clone());
                                let dir = relpath.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
                                media_folders.entry(parent).or_insert(dir);
                                kept.push((item, relpath));
                            }
                        }
                        Err(UpstreamError::Unauth) => {
                            unauth = true;
                            fatal_message = Some(UpstreamError::Unauth.to_string());
                            break;
                        }
                        Err(err) => {
                            fatal_message = Some(err.to_string());
                            break;
                        }
                    }
                }
            }

            if unauth {
                if let Err(err) = self.pool.invalidate(&task.drive_id).await {
                    tracing::warn!(task_id = %task.task_id, %err, "pool invalidation after unauth failed");
                }
            }

            if fatal_message.is_none() {
                // Step 2: Plan.
                let existing =
                    self.stub_store.find_by_task(&task.task_id, Some(RecordState::Active)).await?;
                let by_item: HashMap<RemoteItemId, StubRecord> =
                    existing.into_iter().map(|r| (r.item_id.clone(), r)).collect();
                let seen: HashSet<RemoteItemId> = kept.iter().map(|(i, _)| i.id.clone()).collect();

                // Step 3: Build paths and contents, detecting flat-layout collisions.
                let mut claimed: HashMap<PathBuf, RemoteItemId> = HashMap::new();
                let mut actions: Vec<PlannedAction> = Vec::new();

                for (item, relpath) in kept {
                    let stub_path =
                        build_stub_path(&task.output_dir, &relpath, &item, task.options.preserve_layout);

                    if let Some(owner) = claimed.get(&stub_path) {
                        if owner != &item.id {
                            log.push_item_error(
                                item.id.to_string(),
                                format!(
                                    "stub path collision at {} with item {}",
                                    stub_path.display(),
                                    owner
                                ),
                            );
                            continue;
                        }
                    }
                    claimed.insert(stub_path.clone(), item.id.clone());

                    match by_item.get(&item.id) {
                        None => actions.push(PlannedAction::Create { item, stub_path }),
                        Some(record) => {
                            let on_disk = tokio::fs::try_exists(&record.stub_path).await.unwrap_or(false);
                            let needs_update = task.options.overwrite_existing
                                || record.file_name != item.name
                                || !on_disk;
                            if needs_update {
                                actions.push(PlannedAction::Update {
                                    item,
                                    stub_path,
                                    old_record: record.clone(),
                                });
                            } else {
                                log.counters.skipped += 1;
                            }
                        }
                    }
                }

                if task.options.delete_orphans {
                    for (item_id, record) in &by_item {
                        if !seen.contains(item_id) {
                            actions.push(PlannedAction::Delete { record: record.clone() });
                        }
                    }
                }

                // Step 4: Apply.
                task.total_items = actions.len() as u32;
                task.current_index = 0;
                let mut run_unauth = false;

                for action in actions {
                    task.current_index += 1;
                    let item_id_for_error = match &action {
                        PlannedAction::Create { item, .. } | PlannedAction::Update { item, .. } => {
                            item.id.to_string()
                        }
                        PlannedAction::Delete { record } => record.item_id.to_string(),
                    };
                    let result = match action {
                        PlannedAction::Create { item, stub_path } => {
                            self.apply_create(&task, client.as_ref(), item, stub_path).await
                        }
                        PlannedAction::Update { item, stub_path, old_record } => {
                            self.apply_update(&task, client.as_ref(), item, stub_path, old_record).await
                        }
                        PlannedAction::Delete { record } => self.apply_delete(record).await,
                    };

                    match result {
                        Ok(ApplyOutcome::Created) => log.counters.created += 1,
                        Ok(ApplyOutcome::Updated) => log.counters.updated += 1,
                        Ok(ApplyOutcome::Deleted) => log.counters.deleted += 1,
                        Err(ApplyError::Unauth) => {
                            log.push_item_error(item_id_for_error, UpstreamError::Unauth.to_string());
                            run_unauth = true;
                            break;
                        }
                        Err(ApplyError::Other { item_id, message }) => {
                            log.push_item_error(item_id, message);
                        }
                    }
                }

                if run_unauth {
                    fatal_message = Some(UpstreamError::Unauth.to_string());
                    if let Err(err) = self.pool.invalidate(&task.drive_id).await {
                        tracing::warn!(task_id = %task.task_id, %err, "pool invalidation after unauth failed");
                    }
                } else if task.options.copy_sidecars {
                    // Step 5: Sidecars.
                    self.copy_sidecars(&task, client.as_ref(), &media_folders, &mut log).await;
                }
            }
        }

        // Step 6: Finalise.
        log.ended_at = Utc::now();
        log.outcome = if fatal_message.is_some() { RunOutcome::Error } else { RunOutcome::Success };
        log.fatal_message = fatal_message.clone();
        task.clear_progress();
        task.state = match log.outcome {
            RunOutcome::Success => TaskState::Success,
            RunOutcome::Error => TaskState::Error,
        };
        task.last_run_at = Some(log.ended_at);
        task.last_run_message = fatal_message.or_else(|| {
            Some(format!(
                "created {} updated {} deleted {} errors {}",
                log.counters.created, log.counters.updated, log.counters.deleted, log.counters.errors
            ))
        });
        task.total_runs += 1;
        task.total_items_created += u64::from(log.counters.created);

        self.task_registry.update(task.clone()).await?;
        self.task_registry.append_run_log(log.clone()).await?;
        self.audit.log_run_finished(&log).await;
        Ok(log)
    }

    async fn apply_create(
        &self,
        task: &Task,
        client: &dyn UpstreamClient,
        item: RemoteItem,
        stub_path: PathBuf,
    ) -> Result<ApplyOutcome, ApplyError> {
        let handle = resolve_handle(client, &item).await?;
        let contents = stub_contents(task, &handle);

        write_stub(&stub_path, &contents)
            .await
            .map_err(|e| ApplyError::Other { item_id: item.id.to_string(), message: e.to_string() })?;

        let now = Utc::now();
        let record = StubRecord {
            task_id: task.task_id,
            item_id: item.id.clone(),
            file_name: item.name.clone(),
            size: item.size,
            modified_at: item.modified_at,
            stub_path: stub_path.display().to_string(),
            stub_contents: contents,
            state: RecordState::Active,
            created_at: now,
            updated_at: now,
        };
        self.stub_store
            .upsert(&record)
            .await
            .map_err(|e| ApplyError::Other { item_id: item.id.to_string(), message: e.to_string() })?;
        Ok(ApplyOutcome::Created)
    }

    async fn apply_update(
        &self,
        task: &Task,
        client: &dyn UpstreamClient,
        item: RemoteItem,
        stub_path: PathBuf,
        old_record: StubRecord,
    ) -> Result<ApplyOutcome, ApplyError> {
        let handle = resolve_handle(client, &item).await?;
        let contents = stub_contents(task, &handle);

        if old_record.stub_path != stub_path.display().to_string() {
            let _ = tokio::fs::remove_file(&old_record.stub_path).await;
        }
        write_stub(&stub_path, &contents)
            .await
            .map_err(|e| ApplyError::Other { item_id: item.id.to_string(), message: e.to_string() })?;

        let record = StubRecord {
            task_id: task.task_id,
            item_id: item.id.clone(),
            file_name: item.name.clone(),
            size: item.size,
            modified_at: item.modified_at,
            stub_path: stub_path.display().to_string(),
            stub_contents: contents,
            state: RecordState::Active,
            created_at: old_record.created_at,
            updated_at: Utc::now(),
        };
        self.stub_store
            .upsert(&record)
            .await
            .map_err(|e| ApplyError::Other { item_id: item.id.to_string(), message: e.to_string() })?;
        Ok(ApplyOutcome::Updated)
    }

    async fn apply_delete(&self, mut record: StubRecord) -> Result<ApplyOutcome, ApplyError> {
        let _ = tokio::fs::remove_file(&record.stub_path).await;
        record.mark_deleted();
        self.stub_store
            .mark_deleted(&record.record_id())
            .await
            .map_err(|e| ApplyError::Other { item_id: record.item_id.to_string(), message: e.to_string() })?;
        Ok(ApplyOutcome::Deleted)
    }

    async fn copy_sidecars(
        &self,
        task: &Task,
        client: &dyn UpstreamClient,
        media_folders: &HashMap<RemoteItemId, PathBuf>,
        log: &mut RunLog,
    ) {
        const PAGE_SIZE: u64 = 200;

        for (folder_id, relative_dir) in media_folders {
            let mut offset = 0u64;
            loop {
                let page = match client.list_children(Some(folder_id), offset, PAGE_SIZE).await {
                    Ok(page) => page,
                    Err(err) => {
                        log.push_item_error(folder_id.to_string(), err.to_string());
                        break;
                    }
                };
                let returned = page.items.len() as u64;

                for child in page.items {
                    if child.is_folder() || !is_sidecar(&child.name) {
                        continue;
                    }
                    self.copy_one_sidecar(task, client, &child, relative_dir, log).await;
                }

                if returned < PAGE_SIZE {
                    break;
                }
                offset += returned;
            }
        }
    }

    async fn copy_one_sidecar(
        &self,
        task: &Task,
        client: &dyn UpstreamClient,
        child: &RemoteItem,
        relative_dir: &Path,
        log: &mut RunLog,
    ) {
        let local_dir =
            if task.options.preserve_layout { task.output_dir.join(relative_dir) } else { task.output_dir.clone() };
        let local_path = local_dir.join(&child.name);

        let exists = tokio::fs::try_exists(&local_path).await.unwrap_or(false);
        if exists && !task.options.overwrite_existing {
            log.counters.sidecars_skipped += 1;
            return;
        }

        match self.download_sidecar(client, child, &local_path).await {
            Ok(()) => log.counters.sidecars_copied += 1,
            Err(message) => log.push_item_error(child.id.to_string(), message),
        }
    }

    async fn download_sidecar(
        &self,
        client: &dyn UpstreamClient,
        child: &RemoteItem,
        local_path: &Path,
    ) -> Result<(), String> {
        let handle = child.pick_handle.clone().ok_or("sidecar item has no pick handle")?;
        let url = client.resolve_signed_url(&handle, None).await.map_err(|e| e.to_string())?;
        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .bytes()
            .await
            .map_err(|e| e.to_string())?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
        }
        tokio::fs::write(local_path, &bytes).await.map_err(|e| e.to_string())?;
        Ok(())
    }
}

async fn resolve_handle(client: &dyn UpstreamClient, item: &RemoteItem) -> Result<PickHandle, ApplyError> {
    if let Some(handle) = &item.pick_handle {
        return Ok(handle.clone());
    }
    match client.get_item(&item.id).await {
        Ok(refetched) => refetched
            .pick_handle
            .ok_or_else(|| ApplyError::Other { item_id: item.id.to_string(), message: "upstream item has no pick handle".to_string() }),
        Err(UpstreamError::Unauth) => Err(ApplyError::Unauth),
        Err(err) => Err(ApplyError::Other { item_id: item.id.to_string(), message: err.to_string() }),
    }
}

fn build_stub_path(output_dir: &Path, relpath: &Path, item: &RemoteItem, preserve_layout: bool) -> PathBuf {
    let component = if preserve_layout {
        relpath.to_path_buf()
    } else {
        PathBuf::from(relpath.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| item.name.clone().into()))
    };
    output_dir.join(component.with_extension("strm"))
}

fn stub_contents(task: &Task, handle: &PickHandle) -> String {
    match &task.stub_base_url {
        Some(base) => format!("{}/stream/{}", base.trim_end_matches('/'), handle),
        None => format!("stream://{PLACEHOLDER_DRIVE_KIND}/{handle}"),
    }
}

async fn write_stub(stub_path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = stub_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(stub_path, contents.as_bytes()).await
}

fn is_sidecar(name: &str) -> bool {
    let path = Path::new(name);
    let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
        return false;
    };
    if SIDECAR_EXTS.contains(&ext.as_str()) {
        return true;
    }
    if SIDECAR_IMAGE_EXTS.contains(&ext.as_str()) {
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_lowercase()).unwrap_or_default();
        return SIDECAR_IMAGE_STEMS.iter().any(|role| stem.contains(role));
    }
    false
}
