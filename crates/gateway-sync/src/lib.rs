//! Sync engine, scheduler, and event watcher for the streaming-URL gateway
//!
//! Provides:
//! - The Sync Engine (C7): walk, plan, apply, and sidecar-copy a task's
//!   remote subtree against a local `.strm` stub tree.
//! - The Scheduler (C9): trigger set, per-task mutual exclusion, and the
//!   cooperative tick loop driving scheduled and manual runs.
//! - The Event Watcher (C10): per watch-enabled task polling of the
//!   upstream event feed, requesting resyncs through the scheduler.
//! - A hand-rolled five-field cron evaluator backing `Schedule::Cron`.

pub mod cron;
pub mod engine;
pub mod scheduler;
pub mod watcher;

pub use cron::{CronError, CronSchedule};
pub use engine::{EngineError, SyncEngine};
pub use scheduler::{Scheduler, SchedulerError};
pub use watcher::{run_watch_loop, WatcherRegistry};
