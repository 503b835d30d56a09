//! AuditLogger - structured run/event audit sink
//!
//! Wraps the audit database with convenience methods for each lifecycle
//! event the Sync Engine, Scheduler, and Event Watcher emit. All write
//! methods are non-fatal: persistence errors are logged via
//! `tracing::warn!` but never propagated, so a failing audit write can
//! never break a sync run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;

use gateway_core::domain::{RunLog, RunOutcome, TaskId};

use crate::pool::AuditDb;
use crate::reason::ReasonCode;

/// The kind of lifecycle event recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    RunStarted,
    RunSucceeded,
    RunFailed,
    ScheduleConflict,
    WatcherStarted,
    WatcherPollFailed,
    WatcherResyncTriggered,
    WatcherStopped,
}

impl AuditEventKind {
    fn as_str(self) -> &'static str {
        match self {
            AuditEventKind::RunStarted => "run_started",
            AuditEventKind::RunSucceeded => "run_succeeded",
            AuditEventKind::RunFailed => "run_failed",
            AuditEventKind::ScheduleConflict => "schedule_conflict",
            AuditEventKind::WatcherStarted => "watcher_started",
            AuditEventKind::WatcherPollFailed => "watcher_poll_failed",
            AuditEventKind::WatcherResyncTriggered => "watcher_resync_triggered",
            AuditEventKind::WatcherStopped => "watcher_stopped",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "run_started" => Self::RunStarted,
            "run_succeeded" => Self::RunSucceeded,
            "run_failed" => Self::RunFailed,
            "schedule_conflict" => Self::ScheduleConflict,
            "watcher_started" => Self::WatcherStarted,
            "watcher_poll_failed" => Self::WatcherPollFailed,
            "watcher_resync_triggered" => Self::WatcherResyncTriggered,
            "watcher_stopped" => Self::WatcherStopped,
            _ => return None,
        })
    }
}

fn reason_to_str(reason: ReasonCode) -> String {
    reason.to_string()
}

fn reason_from_str(s: &str) -> Option<ReasonCode> {
    Some(match s {
        "upstream_unauth" => ReasonCode::UpstreamUnauth,
        "upstream_rate_limited" => ReasonCode::UpstreamRateLimited,
        "upstream_transport" => ReasonCode::UpstreamTransport,
        "upstream_api_error" => ReasonCode::UpstreamApiError,
        "stub_path_collision" => ReasonCode::StubPathCollision,
        "missing_drive" => ReasonCode::MissingDrive,
        "task_conflict" => ReasonCode::TaskConflict,
        "sidecar_transfer_failed" => ReasonCode::SidecarTransferFailed,
        "cursor_persist_failed" => ReasonCode::CursorPersistFailed,
        "stub_store_failed" => ReasonCode::StubStoreFailed,
        _ => return None,
    })
}

/// One persisted audit row, returned by the query methods below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub recorded_at: DateTime<Utc>,
    pub task_id: Option<TaskId>,
    pub kind: AuditEventKind,
    pub reason: Option<ReasonCode>,
    pub message: String,
}

/// Structured run/event audit sink backed by its own SQLite database.
pub struct AuditLogger {
    db: AuditDb,
}

impl AuditLogger {
    #[must_use]
    pub fn new(db: AuditDb) -> Self {
        Self { db }
    }

    async fn insert(&self, task_id: Option<TaskId>, kind: AuditEventKind, reason: Option<ReasonCode>, message: &str) {
        let result =
            sqlx::query("INSERT INTO audit_events (recorded_at, task_id, kind, reason, message) VALUES (?, ?, ?, ?, ?)")
                .bind(Utc::now().to_rfc3339())
                .bind(task_id.map(|t| t.to_string()))
                .bind(kind.as_str())
                .bind(reason.map(reason_to_str))
                .bind(message)
                .execute(self.db.pool())
                .await;

        if let Err(err) = result {
            tracing::warn!(%err, "failed to persist audit event");
        }
    }

    pub async fn log_run_started(&self, task_id: TaskId) {
        self.insert(Some(task_id), AuditEventKind::RunStarted, None, "run started").await;
    }

    /// Logs the outcome of a completed run, deriving the reason code from
    /// the log's fatal message when the run failed.
    pub async fn log_run_finished(&self, log: &RunLog) {
        match log.outcome {
            RunOutcome::Success => {
                let message = format!(
                    "created {} updated {} deleted {} skipped {} errors {}",
                    log.counters.created, log.counters.updated, log.counters.deleted, log.counters.skipped, log.counters.errors
                );
                self.insert(Some(log.task_id), AuditEventKind::RunSucceeded, None, &message).await;
            }
            RunOutcome::Error => {
                let message = log.fatal_message.clone().unwrap_or_else(|| "run failed".to_string());
                self.insert(Some(log.task_id), AuditEventKind::RunFailed, Some(ReasonCode::UpstreamTransport), &message)
                    .await;
            }
        }
    }

    pub async fn log_schedule_conflict(&self, task_id: TaskId) {
        self.insert(Some(task_id), AuditEventKind::ScheduleConflict, Some(ReasonCode::TaskConflict), "run skipped: already in flight")
            .await;
    }

    pub async fn log_watcher_event(
        &self,
        task_id: TaskId,
        kind: AuditEventKind,
        reason: Option<ReasonCode>,
        message: impl AsRef<str>,
    ) {
        self.insert(Some(task_id), kind, reason, message.as_ref()).await;
    }

    /// Most recent events for one task, newest first.
    pub async fn recent_for_task(&self, task_id: &TaskId, limit: i64) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT recorded_at, task_id, kind, reason, message FROM audit_events WHERE task_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(task_id.to_string())
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().filter_map(row_to_event).collect())
    }

    /// Most recent events across all tasks, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEvent>, sqlx::Error> {
        let rows = sqlx::query("SELECT recorded_at, task_id, kind, reason, message FROM audit_events ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.into_iter().filter_map(row_to_event).collect())
    }
}

fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Option<AuditEvent> {
    let recorded_at: String = row.try_get("recorded_at").ok()?;
    let task_id: Option<String> = row.try_get("task_id").ok()?;
    let kind: String = row.try_get("kind").ok()?;
    let reason: Option<String> = row.try_get("reason").ok()?;
    let message: String = row.try_get("message").ok()?;

    Some(AuditEvent {
        recorded_at: DateTime::parse_from_rfc3339(&recorded_at).ok()?.with_timezone(&Utc),
        task_id: task_id.and_then(|t| t.parse().ok()),
        kind: AuditEventKind::parse(&kind)?,
        reason: reason.and_then(|r| reason_from_str(&r)),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn logger() -> AuditLogger {
        AuditLogger::new(AuditDb::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn run_finished_success_is_queryable_by_task() {
        let logger = logger().await;
        let task_id = TaskId::new();
        let log = RunLog {
            task_id,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            outcome: RunOutcome::Success,
            counters: gateway_core::domain::RunCounters { created: 3, ..Default::default() },
            item_errors: Vec::new(),
            fatal_message: None,
        };
        logger.log_run_finished(&log).await;

        let events = logger.recent_for_task(&task_id, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditEventKind::RunSucceeded);
        assert!(events[0].message.contains("created 3"));
    }

    #[tokio::test]
    async fn run_finished_error_carries_fatal_message() {
        let logger = logger().await;
        let task_id = TaskId::new();
        let log = RunLog {
            task_id,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            outcome: RunOutcome::Error,
            counters: gateway_core::domain::RunCounters::default(),
            item_errors: Vec::new(),
            fatal_message: Some("unauth".to_string()),
        };
        logger.log_run_finished(&log).await;

        let events = logger.recent_for_task(&task_id, 10).await.unwrap();
        assert_eq!(events[0].kind, AuditEventKind::RunFailed);
        assert_eq!(events[0].message, "unauth");
    }

    #[tokio::test]
    async fn recent_for_task_is_newest_first_and_scoped() {
        let logger = logger().await;
        let task_a = TaskId::new();
        let task_b = TaskId::new();

        logger.log_run_started(task_a).await;
        logger.log_schedule_conflict(task_a).await;
        logger.log_run_started(task_b).await;

        let events = logger.recent_for_task(&task_a, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, AuditEventKind::ScheduleConflict);
        assert_eq!(events[1].kind, AuditEventKind::RunStarted);
    }

    #[tokio::test]
    async fn recent_respects_limit() {
        let logger = logger().await;
        let task_id = TaskId::new();
        for _ in 0..5 {
            logger.log_run_started(task_id).await;
        }
        let events = logger.recent(3).await.unwrap();
        assert_eq!(events.len(), 3);
    }
}
