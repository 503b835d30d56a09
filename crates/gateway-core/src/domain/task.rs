//! Task domain entity
//!
//! A `Task` names a remote subtree to mirror as local `.strm` stubs, its
//! filter, its schedule, its watch configuration, and its live run status.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{DriveId, EventCursor, RemoteItemId, TaskId};

/// Video extensions recognised by the default filter.
pub const VIDEO_EXTS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "ts", "m2ts", "rmvb", "rm",
];

/// Audio extensions recognised by the default filter.
pub const AUDIO_EXTS: &[&str] = &["mp3", "flac", "wav", "aac", "ogg", "m4a", "wma", "ape"];

/// What files a task keeps from the remote subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub include_video: bool,
    pub include_audio: bool,
    /// When set, membership in this set replaces the video/audio rule
    /// entirely (design note §4.7 step 1).
    pub custom_extensions: Option<Vec<String>>,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            include_video: true,
            include_audio: false,
            custom_extensions: None,
        }
    }
}

impl TaskFilter {
    /// Whether a file with the given lowercase extension (no dot) should be
    /// kept. Folders are never evaluated against this predicate.
    #[must_use]
    pub fn keeps_extension(&self, ext: Option<&str>) -> bool {
        let Some(ext) = ext else { return false };
        if let Some(custom) = &self.custom_extensions {
            return custom.iter().any(|e| e.eq_ignore_ascii_case(ext));
        }
        (self.include_video && VIDEO_EXTS.contains(&ext))
            || (self.include_audio && AUDIO_EXTS.contains(&ext))
    }
}

/// Recurring trigger for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    None,
    Interval { period: u32, unit: IntervalUnit },
    Cron {
        minute: String,
        hour: String,
        day_of_month: String,
        month: String,
        day_of_week: String,
    },
}

/// Unit for `Schedule::Interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    #[must_use]
    pub fn as_seconds(self, period: u32) -> i64 {
        let period = i64::from(period);
        match self {
            IntervalUnit::Seconds => period,
            IntervalUnit::Minutes => period * 60,
            IntervalUnit::Hours => period * 3600,
            IntervalUnit::Days => period * 86_400,
        }
    }
}

/// Watch configuration: poll the upstream event feed for incremental
/// re-syncs between scheduled runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    pub enabled: bool,
    pub poll_period_seconds: u32,
    pub last_event_cursor: EventCursor,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_period_seconds: 60,
            last_event_cursor: EventCursor::zero(),
        }
    }
}

/// Per-run behaviour flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub delete_orphans: bool,
    pub preserve_layout: bool,
    pub overwrite_existing: bool,
    pub copy_sidecars: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            delete_orphans: false,
            preserve_layout: true,
            overwrite_existing: false,
            copy_sidecars: false,
        }
    }
}

/// Terminal/live state of a task's most recent (or in-progress) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Pending,
    Running,
    Success,
    Error,
}

/// A stub-sync task: source subtree, filter, schedule, watch, and options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub name: String,
    pub drive_id: DriveId,
    pub source_root_id: RemoteItemId,
    pub output_dir: PathBuf,
    pub stub_base_url: Option<String>,
    pub filter: TaskFilter,
    pub schedule_enabled: bool,
    pub schedule: Schedule,
    pub watch: WatchConfig,
    pub options: SyncOptions,
    pub state: TaskState,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_message: Option<String>,
    pub total_runs: u64,
    pub total_items_created: u64,
    /// Live progress, set during a run and cleared at finalise.
    pub total_items: u32,
    pub current_index: u32,
}

impl Task {
    /// Builds a new, never-run task.
    ///
    /// # Errors
    /// Returns `DomainError::ValidationFailed` for an empty name and
    /// `DomainError::OutputDirNotAbsolute` for a relative `output_dir`.
    pub fn new(
        task_id: TaskId,
        name: impl Into<String>,
        drive_id: DriveId,
        source_root_id: RemoteItemId,
        output_dir: PathBuf,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("task name is empty".into()));
        }
        if !output_dir.is_absolute() {
            return Err(DomainError::OutputDirNotAbsolute(
                output_dir.display().to_string(),
            ));
        }
        Ok(Self {
            task_id,
            name,
            drive_id,
            source_root_id,
            output_dir,
            stub_base_url: None,
            filter: TaskFilter::default(),
            schedule_enabled: false,
            schedule: Schedule::None,
            watch: WatchConfig::default(),
            options: SyncOptions::default(),
            state: TaskState::Idle,
            last_run_at: None,
            last_run_message: None,
            total_runs: 0,
            total_items_created: 0,
            total_items: 0,
            current_index: 0,
        })
    }

    /// Resets live progress fields; called at the end of every run,
    /// success or failure (design note §4.7 step 6).
    pub fn clear_progress(&mut self) {
        self.total_items = 0;
        self.current_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(output_dir: &str) -> Result<Task, DomainError> {
        Task::new(
            TaskId::new(),
            "movies",
            DriveId::from("drive115_1".to_string()),
            RemoteItemId::from("0"),
            PathBuf::from(output_dir),
        )
    }

    #[test]
    fn rejects_relative_output_dir() {
        assert!(matches!(
            new_task("relative/path"),
            Err(DomainError::OutputDirNotAbsolute(_))
        ));
    }

    #[test]
    fn accepts_absolute_output_dir() {
        assert!(new_task("/mnt/media").is_ok());
    }

    #[test]
    fn filter_video_only_keeps_only_video_extensions() {
        let filter = TaskFilter {
            include_video: true,
            include_audio: false,
            custom_extensions: None,
        };
        assert!(filter.keeps_extension(Some("mp4")));
        assert!(!filter.keeps_extension(Some("mp3")));
        assert!(!filter.keeps_extension(Some("txt")));
    }

    #[test]
    fn filter_custom_extensions_override_video_audio_flags() {
        let filter = TaskFilter {
            include_video: true,
            include_audio: true,
            custom_extensions: Some(vec!["epub".to_string()]),
        };
        assert!(filter.keeps_extension(Some("epub")));
        assert!(!filter.keeps_extension(Some("mp4")));
    }

    #[test]
    fn interval_unit_converts_to_seconds() {
        assert_eq!(IntervalUnit::Minutes.as_seconds(5), 300);
        assert_eq!(IntervalUnit::Hours.as_seconds(2), 7200);
    }
}
