//! Event Watcher (C10)
//!
//! Polls the upstream's own event feed rather than a local filesystem —
//! there is no local directory to inotify, the "change source" is remote.
//! The polling loop, ignored/sync-triggering split, and best-effort scoping
//! below follow design note §4.10.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use gateway_audit::{AuditEventKind, AuditLogger, ReasonCode};
use gateway_core::domain::{EventCursor, Task, TaskId, UpstreamEvent, WatcherPhase, WatcherState};
use gateway_core::pool::ProviderPool;
use gateway_core::ports::{TaskRegistry, UpstreamError};

use crate::scheduler::Scheduler;

const EVENT_PAGE_LIMIT: u64 = 200;

/// Shared, query-able watcher state per task, for the operational UI
/// mentioned in design note §4.10's last paragraph.
#[derive(Default, Clone)]
pub struct WatcherRegistry {
    states: Arc<RwLock<HashMap<TaskId, WatcherState>>>,
}

impl WatcherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn insert_starting(&self, task_id: TaskId) {
        self.states.write().await.insert(task_id, WatcherState::starting(task_id));
    }

    async fn mutate(&self, task_id: &TaskId, f: impl FnOnce(&mut WatcherState)) {
        if let Some(state) = self.states.write().await.get_mut(task_id) {
            f(state);
        }
    }

    pub async fn snapshot(&self, task_id: &TaskId) -> Option<WatcherState> {
        self.states.read().await.get(task_id).cloned()
    }

    pub async fn remove(&self, task_id: &TaskId) {
        self.states.write().await.remove(task_id);
    }
}

/// Runs the poll loop for one watch-enabled task until `shutdown` fires or
/// the upstream reports `unauth`. Intended to be spawned as its own task by
/// the component wiring the scheduler together (`gateway-server`).
pub async fn run_watch_loop(
    task_id: TaskId,
    poll_period: Duration,
    pool: Arc<ProviderPool>,
    task_registry: Arc<dyn TaskRegistry>,
    scheduler: Arc<Scheduler>,
    registry: WatcherRegistry,
    audit: Arc<AuditLogger>,
    shutdown: CancellationToken,
) {
    registry.insert_starting(task_id).await;
    audit.log_watcher_event(task_id, AuditEventKind::WatcherStarted, None, "watcher started").await;

    loop {
        tokio::select! {
            () = tokio::time::sleep(poll_period) => {}
            () = shutdown.cancelled() => {
                registry.mutate(&task_id, |s| {
                    s.phase = WatcherPhase::Stopped;
                    s.push_log("watcher stopped: shutdown requested");
                }).await;
                audit.log_watcher_event(task_id, AuditEventKind::WatcherStopped, None, "watcher stopped: shutdown requested").await;
                break;
            }
        }

        let task = match task_registry.get(&task_id).await {
            Ok(task) => task,
            Err(err) => {
                registry
                    .mutate(&task_id, |s| {
                        s.phase = WatcherPhase::Failed;
                        s.push_log(format!("watcher stopped: task lookup failed: {err}"));
                    })
                    .await;
                break;
            }
        };
        if !task.watch.enabled {
            registry.mutate(&task_id, |s| s.push_log("watcher stopped: watch disabled")).await;
            break;
        }

        let entry = match pool.acquire(&task.drive_id).await {
            Ok(entry) => entry,
            Err(err) => {
                registry
                    .mutate(&task_id, |s| {
                        s.phase = WatcherPhase::Failed;
                        s.push_log(format!("poll skipped: pool unavailable: {err}"));
                    })
                    .await;
                continue;
            }
        };

        let mut cursor = task.watch.last_event_cursor;
        let mut in_scope: Vec<UpstreamEvent> = Vec::new();
        let mut highest_seen = cursor;
        let mut unauth = false;

        loop {
            let page = match entry.client.list_events(Some(cursor), EVENT_PAGE_LIMIT).await {
                Ok(page) => page,
                Err(UpstreamError::Unauth) => {
                    unauth = true;
                    break;
                }
                Err(err) => {
                    registry
                        .mutate(&task_id, |s| s.push_log(format!("poll failed: {err}")))
                        .await;
                    audit
                        .log_watcher_event(
                            task_id,
                            AuditEventKind::WatcherPollFailed,
                            Some(ReasonCode::UpstreamTransport),
                            format!("poll failed: {err}"),
                        )
                        .await;
                    break;
                }
            };

            let returned = page.events.len() as u64;
            let oldest_id = page.events.first().map(|e| e.id);

            for event in page.events {
                highest_seen = highest_seen.max(EventCursor(event.id));
                if is_in_scope(&event, &task) {
                    in_scope.push(event);
                }
            }

            cursor = page.new_cursor;
            let caught_up = returned < EVENT_PAGE_LIMIT || oldest_id.is_some_and(|id| id <= cursor.0);
            if caught_up {
                break;
            }
        }

        if unauth {
            if let Err(err) = pool.invalidate(&task.drive_id).await {
                tracing::warn!(%task_id, %err, "pool invalidation after watcher unauth failed");
            }
            registry
                .mutate(&task_id, |s| {
                    s.phase = WatcherPhase::Failed;
                    s.push_log("watcher exiting: upstream reported unauth");
                })
                .await;
            audit
                .log_watcher_event(
                    task_id,
                    AuditEventKind::WatcherStopped,
                    Some(ReasonCode::UpstreamUnauth),
                    "watcher exiting: upstream reported unauth",
                )
                .await;
            break;
        }

        registry.mutate(&task_id, |s| s.record_poll(highest_seen)).await;

        if !in_scope.is_empty() {
            let mut updated_task = task.clone();
            updated_task.watch.last_event_cursor = highest_seen;
            if let Err(err) = task_registry.update(updated_task).await {
                registry
                    .mutate(&task_id, |s| s.push_log(format!("cursor persist failed: {err}")))
                    .await;
            }

            match scheduler.run_now(&task_id).await {
                Ok(_) => {
                    let message = format!("resync triggered by {} event(s)", in_scope.len());
                    registry.mutate(&task_id, |s| s.push_log(message.clone())).await;
                    audit.log_watcher_event(task_id, AuditEventKind::WatcherResyncTriggered, None, message).await;
                }
                Err(err) => {
                    registry
                        .mutate(&task_id, |s| s.push_log(format!("resync request skipped: {err}")))
                        .await;
                }
            }
        }
    }

    registry.remove(&task_id).await;
}

/// Whether an event should trigger a resync: in the sync-triggering set,
/// not in the ignored set, and under the task's source root.
///
/// Scoping is best-effort (design note §4.10): the feed only carries the event's
/// immediate parent, so an event several levels below `source_root_id`
/// cannot be distinguished from one under a different root without an
/// extra lookup. Direct children of the root are scoped exactly; deeper
/// events are accepted rather than silently dropped, since a missed resync
/// is worse than a spurious one.
fn is_in_scope(event: &UpstreamEvent, task: &Task) -> bool {
    if event.event_type.is_ignored() || !event.event_type.triggers_sync() {
        return false;
    }
    match &event.parent_id {
        Some(parent) if *parent != task.source_root_id => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gateway_core::domain::{DriveId, EventType, RemoteItemId};
    use std::path::PathBuf;

    fn task() -> gateway_core::domain::Task {
        gateway_core::domain::Task::new(
            TaskId::new(),
            "t",
            DriveId::from("drive115_1".to_string()),
            RemoteItemId::from("root"),
            PathBuf::from("/mnt"),
        )
        .unwrap()
    }

    fn event(id: i64, event_type: EventType, parent: Option<&str>) -> UpstreamEvent {
        UpstreamEvent {
            id,
            event_type,
            file_id: RemoteItemId::from("f"),
            file_name: "f.mp4".into(),
            parent_id: parent.map(RemoteItemId::from),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn ignored_type_is_out_of_scope() {
        let t = task();
        let ev = event(1, EventType::FolderLabel, Some("root"));
        assert!(!is_in_scope(&ev, &t));
    }

    #[test]
    fn non_triggering_unknown_type_is_out_of_scope() {
        let t = task();
        let ev = event(1, EventType::Other(999), Some("root"));
        assert!(!is_in_scope(&ev, &t));
    }

    #[test]
    fn sibling_root_parent_is_in_scope() {
        let t = task();
        let ev = event(1, EventType::Upload, Some("root"));
        assert!(is_in_scope(&ev, &t));
    }

    #[test]
    fn different_parent_is_out_of_scope() {
        let t = task();
        let ev = event(1, EventType::Upload, Some("other-folder"));
        assert!(!is_in_scope(&ev, &t));
    }

    #[test]
    fn missing_parent_is_accepted_as_best_effort() {
        let t = task();
        let ev = event(1, EventType::Upload, None);
        assert!(is_in_scope(&ev, &t));
    }
}
