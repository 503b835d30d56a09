//! WatcherState domain entity
//!
//! Observable state of a per-task event watcher, exposed through a query
//! interface for operational tooling (design note §4.10).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{EventCursor, TaskId};

/// Lifecycle phase of a watcher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherPhase {
    Starting,
    Running,
    Failed,
    Stopped,
}

/// Bound on the in-memory log ring kept per watcher.
pub const WATCHER_LOG_CAPACITY: usize = 20;

/// Observable state of one task's event watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherState {
    pub task_id: TaskId,
    pub phase: WatcherPhase,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_cursor: EventCursor,
    log: VecDeque<String>,
}

impl WatcherState {
    #[must_use]
    pub fn starting(task_id: TaskId) -> Self {
        Self {
            task_id,
            phase: WatcherPhase::Starting,
            last_poll_at: None,
            last_cursor: EventCursor::zero(),
            log: VecDeque::with_capacity(WATCHER_LOG_CAPACITY),
        }
    }

    /// Appends a short log line, evicting the oldest entry once the ring is
    /// full.
    pub fn push_log(&mut self, line: impl Into<String>) {
        if self.log.len() == WATCHER_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(line.into());
    }

    #[must_use]
    pub fn recent_log(&self) -> Vec<&str> {
        self.log.iter().map(String::as_str).collect()
    }

    pub fn record_poll(&mut self, cursor: EventCursor) {
        self.last_poll_at = Some(Utc::now());
        self.last_cursor = self.last_cursor.max(cursor);
        self.phase = WatcherPhase::Running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_ring_evicts_oldest_past_capacity() {
        let mut state = WatcherState::starting(TaskId::new());
        for i in 0..(WATCHER_LOG_CAPACITY + 5) {
            state.push_log(format!("line {i}"));
        }
        assert_eq!(state.recent_log().len(), WATCHER_LOG_CAPACITY);
        assert_eq!(state.recent_log()[0], "line 5");
    }

    #[test]
    fn record_poll_moves_to_running_and_advances_cursor() {
        let mut state = WatcherState::starting(TaskId::new());
        state.record_poll(EventCursor(5));
        assert_eq!(state.phase, WatcherPhase::Running);
        assert_eq!(state.last_cursor, EventCursor(5));
        state.record_poll(EventCursor(2));
        assert_eq!(state.last_cursor, EventCursor(5));
    }
}
