//! RunLog domain entity
//!
//! One row per task execution: timing, terminal state, aggregate counters,
//! and a bounded sample of per-item error diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::TaskId;

/// Terminal outcome of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Error,
}

/// Maximum number of per-item error diagnostics kept per run log, to bound
/// storage for runs with many small failures.
pub const MAX_CAPTURED_ITEM_ERRORS: usize = 50;

/// Aggregate counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub scanned: u32,
    pub created: u32,
    pub updated: u32,
    pub deleted: u32,
    pub skipped: u32,
    pub errors: u32,
    pub sidecars_copied: u32,
    pub sidecars_skipped: u32,
}

/// A single per-item error captured during a run, bounded at
/// `MAX_CAPTURED_ITEM_ERRORS` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub item_id: String,
    pub message: String,
}

/// One completed (or failed) task execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLog {
    pub task_id: TaskId,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    pub counters: RunCounters,
    pub item_errors: Vec<ItemError>,
    /// Present only when `outcome == Error` and the failure was whole-walk
    /// (upstream `unauth`, or the upstream giving up), per design note §4.7.
    pub fatal_message: Option<String>,
}

impl RunLog {
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// Records a per-item error, silently dropping captures past the bound
    /// (the error still increments `counters.errors`; only the diagnostic
    /// text is truncated).
    pub fn push_item_error(&mut self, item_id: impl Into<String>, message: impl Into<String>) {
        self.counters.errors += 1;
        if self.item_errors.len() < MAX_CAPTURED_ITEM_ERRORS {
            self.item_errors.push(ItemError {
                item_id: item_id.into(),
                message: message.into(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn empty_log() -> RunLog {
        let start = Utc::now();
        RunLog {
            task_id: TaskId::new(),
            started_at: start,
            ended_at: start + Duration::seconds(3),
            outcome: RunOutcome::Success,
            counters: RunCounters::default(),
            item_errors: Vec::new(),
            fatal_message: None,
        }
    }

    #[test]
    fn duration_ms_reflects_start_end_gap() {
        let log = empty_log();
        assert_eq!(log.duration_ms(), 3000);
    }

    #[test]
    fn item_errors_are_capped() {
        let mut log = empty_log();
        for i in 0..(MAX_CAPTURED_ITEM_ERRORS + 10) {
            log.push_item_error(i.to_string(), "boom");
        }
        assert_eq!(log.item_errors.len(), MAX_CAPTURED_ITEM_ERRORS);
        assert_eq!(log.counters.errors as usize, MAX_CAPTURED_ITEM_ERRORS + 10);
    }
}
