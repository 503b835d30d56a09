//! Scheduler (C9)
//!
//! A cooperative single-owner loop reacting to a shared signal, driving
//! schedule-driven and manual task execution with a per-task mutex
//! enforcing at most one in-flight run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use gateway_audit::AuditLogger;
use gateway_core::domain::{RunLog, Schedule, Task, TaskId};

use crate::cron::CronSchedule;
use crate::engine::{EngineError, SyncEngine};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("task {0} is already running")]
    Conflict(TaskId),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Per-task mutual exclusion, kept as its own small type so the locking
/// invariant (design note §8 property 8) can be exercised without standing up a
/// full `SyncEngine`.
#[derive(Default)]
struct TaskLocks(DashMap<TaskId, Arc<Mutex<()>>>);

impl TaskLocks {
    fn lock_for(&self, task_id: &TaskId) -> Arc<Mutex<()>> {
        self.0.entry(*task_id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn forget(&self, task_id: &TaskId) {
        self.0.remove(task_id);
    }
}

/// Computes the next fire time strictly after `after` for a task's
/// schedule. `Schedule::None` and unparseable cron expressions never fire.
fn next_fire_from(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::None => None,
        Schedule::Interval { period, unit } => {
            Some(after + chrono::Duration::seconds(unit.as_seconds(*period)))
        }
        Schedule::Cron { minute, hour, day_of_month, month, day_of_week } => {
            CronSchedule::parse(minute, hour, day_of_month, month, day_of_week)
                .ok()?
                .next_after(after)
        }
    }
}

struct TriggerEntry {
    schedule: Schedule,
    next_fire: DateTime<Utc>,
    paused: bool,
}

/// Owns the trigger set (scheduled tasks due to run), the per-task mutex
/// map, and drives the cooperative tick loop. The watcher set (per
/// watch-enabled task pollers) is owned by [`crate::watcher`]; watchers
/// request runs back through [`Scheduler::run_now`].
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    locks: TaskLocks,
    triggers: DashMap<TaskId, TriggerEntry>,
    shutdown: CancellationToken,
    audit: Arc<AuditLogger>,
}

impl Scheduler {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine>, shutdown: CancellationToken, audit: Arc<AuditLogger>) -> Self {
        Self { engine, locks: TaskLocks::default(), triggers: DashMap::new(), shutdown, audit }
    }

    /// Registers (or re-registers) a task's trigger from its current
    /// schedule. No-op if the task has no schedule or scheduling is
    /// disabled.
    pub fn add(&self, task: &Task) {
        self.triggers.remove(&task.task_id);
        if !task.schedule_enabled {
            return;
        }
        if let Some(next_fire) = next_fire_from(&task.schedule, Utc::now()) {
            self.triggers.insert(
                task.task_id,
                TriggerEntry { schedule: task.schedule.clone(), next_fire, paused: false },
            );
        }
    }

    pub fn remove(&self, task_id: &TaskId) {
        self.triggers.remove(task_id);
        self.locks.forget(task_id);
    }

    pub fn pause(&self, task_id: &TaskId) {
        if let Some(mut entry) = self.triggers.get_mut(task_id) {
            entry.paused = true;
        }
    }

    pub fn resume(&self, task_id: &TaskId) {
        if let Some(mut entry) = self.triggers.get_mut(task_id) {
            entry.paused = false;
        }
    }

    /// Runs `task_id` now, failing fast with `Conflict` if a run for the
    /// same task is already in flight. Used for both manual "run now"
    /// requests and watcher-triggered resyncs.
    pub async fn run_now(&self, task_id: &TaskId) -> Result<RunLog, SchedulerError> {
        let lock = self.locks.lock_for(task_id);
        let Ok(_guard) = Arc::clone(&lock).try_lock_owned() else {
            self.audit.log_schedule_conflict(*task_id).await;
            return Err(SchedulerError::Conflict(*task_id));
        };

        let result = self.engine.run_task(task_id).await?;

        if let Some(mut entry) = self.triggers.get_mut(task_id) {
            if let Some(next_fire) = next_fire_from(&entry.schedule, Utc::now()) {
                entry.next_fire = next_fire;
            }
        }
        Ok(result)
    }

    /// Scans the trigger set for due, unpaused tasks and runs each. A task
    /// already mid-run (mutex held) is skipped this tick rather than
    /// queued, and will simply be picked up again next tick.
    pub async fn tick(&self) {
        let now = Utc::now();
        let due: Vec<TaskId> = self
            .triggers
            .iter()
            .filter(|entry| !entry.paused && entry.next_fire <= now)
            .map(|entry| *entry.key())
            .collect();

        for task_id in due {
            match self.run_now(&task_id).await {
                Ok(_) => {}
                Err(SchedulerError::Conflict(_)) => {
                    tracing::debug!(%task_id, "scheduler tick skipped: run already in flight");
                }
                Err(err) => {
                    tracing::warn!(%task_id, %err, "scheduled run failed");
                }
            }
        }
    }

    /// Cooperative tick loop; returns once the shutdown token is cancelled.
    pub async fn run(&self, tick_interval: Duration) {
        let mut ticker = tokio::time::interval(tick_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                () = self.shutdown.cancelled() => {
                    tracing::info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Current next-fire snapshot, for the operational query surface.
    #[must_use]
    pub fn next_fires(&self) -> HashMap<TaskId, DateTime<Utc>> {
        self.triggers.iter().map(|e| (*e.key(), e.next_fire)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::domain::IntervalUnit;

    #[test]
    fn interval_schedule_fires_after_its_period() {
        let schedule = Schedule::Interval { period: 30, unit: IntervalUnit::Minutes };
        let start = Utc::now();
        let next = next_fire_from(&schedule, start).unwrap();
        assert_eq!((next - start).num_seconds(), 1800);
    }

    #[test]
    fn none_schedule_never_fires() {
        assert!(next_fire_from(&Schedule::None, Utc::now()).is_none());
    }

    #[test]
    fn cron_schedule_delegates_to_cron_evaluator() {
        let schedule = Schedule::Cron {
            minute: "0".into(),
            hour: "3".into(),
            day_of_month: "*".into(),
            month: "*".into(),
            day_of_week: "*".into(),
        };
        assert!(next_fire_from(&schedule, Utc::now()).is_some());
    }

    #[tokio::test]
    async fn task_locks_enforce_mutual_exclusion() {
        let locks = TaskLocks::default();
        let task_id = TaskId::new();

        let lock = locks.lock_for(&task_id);
        let _first = Arc::clone(&lock).try_lock_owned().unwrap();

        let contending = locks.lock_for(&task_id);
        assert!(Arc::clone(&contending).try_lock_owned().is_err());
    }

    #[tokio::test]
    async fn task_locks_release_after_guard_drops() {
        let locks = TaskLocks::default();
        let task_id = TaskId::new();

        let lock = locks.lock_for(&task_id);
        {
            let _guard = Arc::clone(&lock).try_lock_owned().unwrap();
        }
        assert!(Arc::clone(&lock).try_lock_owned().is_ok());
    }
}
