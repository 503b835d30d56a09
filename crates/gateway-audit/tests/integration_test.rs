//! Integration test: AuditLogger → SQLite → query back
//!
//! Exercises the full flow against a real in-memory SQLite database: a run
//! lifecycle, a scheduler conflict, and a watcher event, then reads them
//! back through the query surface `gateway logs` uses.

use chrono::Utc;
use gateway_audit::{AuditDb, AuditEventKind, AuditLogger};
use gateway_core::domain::{RunCounters, RunLog, RunOutcome, TaskId};

#[tokio::test]
async fn full_run_lifecycle_is_queryable_newest_first() {
    let db = AuditDb::in_memory().await.expect("failed to create in-memory audit db");
    let logger = AuditLogger::new(db);

    let task_id = TaskId::new();

    logger.log_run_started(task_id).await;

    let log = RunLog {
        task_id,
        started_at: Utc::now(),
        ended_at: Utc::now(),
        outcome: RunOutcome::Success,
        counters: RunCounters { scanned: 4, created: 2, skipped: 2, ..Default::default() },
        item_errors: Vec::new(),
        fatal_message: None,
    };
    logger.log_run_finished(&log).await;

    logger.log_schedule_conflict(task_id).await;

    let events = logger.recent_for_task(&task_id, 10).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind, AuditEventKind::ScheduleConflict);
    assert_eq!(events[1].kind, AuditEventKind::RunSucceeded);
    assert_eq!(events[2].kind, AuditEventKind::RunStarted);
    assert!(events.iter().all(|e| e.task_id == Some(task_id)));
}

#[tokio::test]
async fn events_for_other_tasks_are_not_returned() {
    let db = AuditDb::in_memory().await.unwrap();
    let logger = AuditLogger::new(db);

    let task_a = TaskId::new();
    let task_b = TaskId::new();
    logger.log_run_started(task_a).await;
    logger.log_run_started(task_b).await;

    let events = logger.recent_for_task(&task_a, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].task_id, Some(task_a));
}
