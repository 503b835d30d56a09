//! SQLite implementation of the `TaskRegistry` port (C8)
//!
//! Scalar/indexed fields get their own column; nested config (`filter`,
//! `schedule`, `watch`, `options`) and run-log counters/item-errors are
//! stored as serde-serialized JSON columns.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use gateway_core::domain::{
    DriveId, RunCounters, RunLog, RunOutcome, Schedule, SyncOptions, Task, TaskFilter, TaskId,
    TaskState, WatchConfig,
};
use gateway_core::ports::task_registry::{TaskRegistry, TaskRegistryError};

fn task_state_to_str(state: TaskState) -> &'static str {
    match state {
        TaskState::Idle => "idle",
        TaskState::Pending => "pending",
        TaskState::Running => "running",
        TaskState::Success => "success",
        TaskState::Error => "error",
    }
}

fn task_state_from_str(s: &str) -> Result<TaskState, TaskRegistryError> {
    match s {
        "idle" => Ok(TaskState::Idle),
        "pending" => Ok(TaskState::Pending),
        "running" => Ok(TaskState::Running),
        "success" => Ok(TaskState::Success),
        "error" => Ok(TaskState::Error),
        other => Err(TaskRegistryError::Io(anyhow::anyhow!("unknown task state '{other}'"))),
    }
}

fn run_outcome_to_str(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Success => "success",
        RunOutcome::Error => "error",
    }
}

fn run_outcome_from_str(s: &str) -> Result<RunOutcome, TaskRegistryError> {
    match s {
        "success" => Ok(RunOutcome::Success),
        "error" => Ok(RunOutcome::Error),
        other => Err(TaskRegistryError::Io(anyhow::anyhow!("unknown run outcome '{other}'"))),
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TaskRegistryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid timestamp '{s}': {e}")))
}

fn task_from_row(row: &SqliteRow) -> Result<Task, TaskRegistryError> {
    let task_id_str: String = row.get("task_id");
    let drive_id_str: String = row.get("drive_id");
    let source_root_id: String = row.get("source_root_id");
    let output_dir: String = row.get("output_dir");
    let filter_json: String = row.get("filter_json");
    let schedule_json: String = row.get("schedule_json");
    let watch_json: String = row.get("watch_json");
    let options_json: String = row.get("options_json");
    let state_str: String = row.get("state");
    let last_run_at_str: Option<String> = row.get("last_run_at");
    let total_runs: i64 = row.get("total_runs");
    let total_items_created: i64 = row.get("total_items_created");
    let total_items: i64 = row.get("total_items");
    let current_index: i64 = row.get("current_index");

    let task_id = TaskId::from_str(&task_id_str)
        .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid task id '{task_id_str}': {e}")))?;

    Ok(Task {
        task_id,
        name: row.get("name"),
        drive_id: DriveId::from(drive_id_str),
        source_root_id: source_root_id.into(),
        output_dir: PathBuf::from(output_dir),
        stub_base_url: row.get("stub_base_url"),
        filter: serde_json::from_str::<TaskFilter>(&filter_json)
            .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid filter json: {e}")))?,
        schedule_enabled: row.get::<i64, _>("schedule_enabled") != 0,
        schedule: serde_json::from_str::<Schedule>(&schedule_json)
            .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid schedule json: {e}")))?,
        watch: serde_json::from_str::<WatchConfig>(&watch_json)
            .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid watch json: {e}")))?,
        options: serde_json::from_str::<SyncOptions>(&options_json)
            .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid options json: {e}")))?,
        state: task_state_from_str(&state_str)?,
        last_run_at: last_run_at_str.map(|s| parse_datetime(&s)).transpose()?,
        last_run_message: row.get("last_run_message"),
        total_runs: total_runs as u64,
        total_items_created: total_items_created as u64,
        total_items: total_items as u32,
        current_index: current_index as u32,
    })
}

fn run_log_from_row(row: &SqliteRow) -> Result<RunLog, TaskRegistryError> {
    let task_id_str: String = row.get("task_id");
    let started_at_str: String = row.get("started_at");
    let ended_at_str: String = row.get("ended_at");
    let outcome_str: String = row.get("outcome");
    let counters_json: String = row.get("counters_json");
    let item_errors_json: String = row.get("item_errors_json");

    let task_id = TaskId::from_str(&task_id_str)
        .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid task id '{task_id_str}': {e}")))?;

    Ok(RunLog {
        task_id,
        started_at: parse_datetime(&started_at_str)?,
        ended_at: parse_datetime(&ended_at_str)?,
        outcome: run_outcome_from_str(&outcome_str)?,
        counters: serde_json::from_str::<RunCounters>(&counters_json)
            .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid counters json: {e}")))?,
        item_errors: serde_json::from_str(&item_errors_json)
            .map_err(|e| TaskRegistryError::Io(anyhow::anyhow!("invalid item errors json: {e}")))?,
        fatal_message: row.get("fatal_message"),
    })
}

/// SQLite-backed `TaskRegistry`.
pub struct SqliteTaskRegistry {
    pool: SqlitePool,
}

impl SqliteTaskRegistry {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn drive_exists(&self, drive_id: &DriveId) -> Result<bool, TaskRegistryError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM drives WHERE id = ?")
            .bind(drive_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TaskRegistryError::Io(e.into()))?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl TaskRegistry for SqliteTaskRegistry {
    async fn create(&self, task: Task) -> Result<Task, TaskRegistryError> {
        if !self.drive_exists(&task.drive_id).await? {
            return Err(TaskRegistryError::Validation(
                gateway_core::domain::DomainError::ValidationFailed(format!(
                    "no such drive: {}",
                    task.drive_id
                )),
            ));
        }

        let filter_json = serde_json::to_string(&task.filter)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;
        let schedule_json = serde_json::to_string(&task.schedule)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;
        let watch_json = serde_json::to_string(&task.watch)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;
        let options_json = serde_json::to_string(&task.options)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;

        sqlx::query(
            "INSERT INTO tasks \
             (task_id, name, drive_id, source_root_id, output_dir, stub_base_url, \
              filter_json, schedule_enabled, schedule_json, watch_json, options_json, \
              state, last_run_at, last_run_message, total_runs, total_items_created, \
              total_items, current_index) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.task_id.to_string())
        .bind(&task.name)
        .bind(task.drive_id.as_str())
        .bind(task.source_root_id.as_str())
        .bind(task.output_dir.display().to_string())
        .bind(&task.stub_base_url)
        .bind(&filter_json)
        .bind(task.schedule_enabled as i64)
        .bind(&schedule_json)
        .bind(&watch_json)
        .bind(&options_json)
        .bind(task_state_to_str(task.state))
        .bind(task.last_run_at.map(|dt| dt.to_rfc3339()))
        .bind(&task.last_run_message)
        .bind(task.total_runs as i64)
        .bind(task.total_items_created as i64)
        .bind(task.total_items as i64)
        .bind(task.current_index as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| TaskRegistryError::Io(e.into()))?;

        tracing::info!(task_id = %task.task_id, name = %task.name, "task created");
        Ok(task)
    }

    async fn get(&self, task_id: &TaskId) -> Result<Task, TaskRegistryError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TaskRegistryError::Io(e.into()))?;

        match row {
            Some(ref r) => task_from_row(r),
            None => Err(TaskRegistryError::NotFound(*task_id)),
        }
    }

    async fn update(&self, task: Task) -> Result<Task, TaskRegistryError> {
        let filter_json = serde_json::to_string(&task.filter)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;
        let schedule_json = serde_json::to_string(&task.schedule)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;
        let watch_json = serde_json::to_string(&task.watch)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;
        let options_json = serde_json::to_string(&task.options)
            .map_err(|e| TaskRegistryError::Io(e.into()))?;

        let result = sqlx::query(
            "UPDATE tasks SET name = ?, source_root_id = ?, output_dir = ?, stub_base_url = ?, \
             filter_json = ?, schedule_enabled = ?, schedule_json = ?, watch_json = ?, \
             options_json = ?, state = ?, last_run_at = ?, last_run_message = ?, \
             total_runs = ?, total_items_created = ?, total_items = ?, current_index = ? \
             WHERE task_id = ?",
        )
        .bind(&task.name)
        .bind(task.source_root_id.as_str())
        .bind(task.output_dir.display().to_string())
        .bind(&task.stub_base_url)
        .bind(&filter_json)
        .bind(task.schedule_enabled as i64)
        .bind(&schedule_json)
        .bind(&watch_json)
        .bind(&options_json)
        .bind(task_state_to_str(task.state))
        .bind(task.last_run_at.map(|dt| dt.to_rfc3339()))
        .bind(&task.last_run_message)
        .bind(task.total_runs as i64)
        .bind(task.total_items_created as i64)
        .bind(task.total_items as i64)
        .bind(task.current_index as i64)
        .bind(task.task_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| TaskRegistryError::Io(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(TaskRegistryError::NotFound(task.task_id));
        }
        Ok(task)
    }

    async fn delete(&self, task_id: &TaskId) -> Result<(), TaskRegistryError> {
        let result = sqlx::query("DELETE FROM tasks WHERE task_id = ?")
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| TaskRegistryError::Io(e.into()))?;

        if result.rows_affected() == 0 {
            return Err(TaskRegistryError::NotFound(*task_id));
        }
        tracing::info!(%task_id, "task deleted");
        Ok(())
    }

    async fn list_for_drive(&self, drive_id: &DriveId) -> Result<Vec<Task>, TaskRegistryError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE drive_id = ? ORDER BY task_id")
            .bind(drive_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TaskRegistryError::Io(e.into()))?;

        rows.iter().map(task_from_row).collect()
    }

    async fn list_all(&self) -> Result<Vec<Task>, TaskRegistryError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY task_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TaskRegistryError::Io(e.into()))?;

        rows.iter().map(task_from_row).collect()
    }

    async fn append_run_log(&self, log: RunLog) -> Result<(), TaskRegistryError> {
        let counters_json =
            serde_json::to_string(&log.counters).map_err(|e| TaskRegistryError::Io(e.into()))?;
        let item_errors_json =
            serde_json::to_string(&log.item_errors).map_err(|e| TaskRegistryError::Io(e.into()))?;

        sqlx::query(
            "INSERT INTO run_logs \
             (task_id, started_at, ended_at, outcome, counters_json, item_errors_json, fatal_message) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.task_id.to_string())
        .bind(log.started_at.to_rfc3339())
        .bind(log.ended_at.to_rfc3339())
        .bind(run_outcome_to_str(log.outcome))
        .bind(&counters_json)
        .bind(&item_errors_json)
        .bind(&log.fatal_message)
        .execute(&self.pool)
        .await
        .map_err(|e| TaskRegistryError::Io(e.into()))?;

        tracing::debug!(task_id = %log.task_id, outcome = ?log.outcome, "run log appended");
        Ok(())
    }

    async fn recent_run_logs(
        &self,
        task_id: &TaskId,
        limit: u32,
    ) -> Result<Vec<RunLog>, TaskRegistryError> {
        let rows = sqlx::query(
            "SELECT * FROM run_logs WHERE task_id = ? ORDER BY started_at DESC LIMIT ?",
        )
        .bind(task_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| TaskRegistryError::Io(e.into()))?;

        rows.iter().map(run_log_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DatabasePool;
    use gateway_core::domain::RemoteItemId;

    async fn seeded_registry() -> (SqliteTaskRegistry, DriveId) {
        let db = DatabasePool::in_memory().await.unwrap();
        let drive_id = DriveId::from("drive115_1".to_string());
        sqlx::query(
            "INSERT INTO drives (id, name, kind, created_at, is_current) VALUES (?, 'n', 'drive115', ?, 0)",
        )
        .bind(drive_id.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await
        .unwrap();
        (SqliteTaskRegistry::new(db.pool().clone()), drive_id)
    }

    fn sample_task(drive_id: DriveId) -> Task {
        Task::new(
            TaskId::new(),
            "movies",
            drive_id,
            RemoteItemId::from("0"),
            PathBuf::from("/mnt/media"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn create_rejects_unknown_drive() {
        let (registry, _) = seeded_registry().await;
        let task = sample_task(DriveId::from("does_not_exist".to_string()));
        assert!(matches!(
            registry.create(task).await,
            Err(TaskRegistryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let (registry, drive_id) = seeded_registry().await;
        let task = sample_task(drive_id);
        let task_id = task.task_id;
        registry.create(task).await.unwrap();

        let fetched = registry.get(&task_id).await.unwrap();
        assert_eq!(fetched.name, "movies");
        assert_eq!(fetched.state, TaskState::Idle);
    }

    #[tokio::test]
    async fn update_persists_state_change() {
        let (registry, drive_id) = seeded_registry().await;
        let task = sample_task(drive_id);
        let task_id = task.task_id;
        let mut created = registry.create(task).await.unwrap();

        created.state = TaskState::Running;
        registry.update(created).await.unwrap();

        let fetched = registry.get(&task_id).await.unwrap();
        assert_eq!(fetched.state, TaskState::Running);
    }

    #[tokio::test]
    async fn delete_then_get_errors_not_found() {
        let (registry, drive_id) = seeded_registry().await;
        let task = sample_task(drive_id);
        let task_id = task.task_id;
        registry.create(task).await.unwrap();
        registry.delete(&task_id).await.unwrap();

        assert!(matches!(registry.get(&task_id).await, Err(TaskRegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn append_and_recent_run_logs_orders_newest_first() {
        let (registry, drive_id) = seeded_registry().await;
        let task = sample_task(drive_id);
        let task_id = task.task_id;
        registry.create(task).await.unwrap();

        let start = Utc::now();
        for i in 0..3 {
            let mut log = RunLog {
                task_id,
                started_at: start + chrono::Duration::seconds(i),
                ended_at: start + chrono::Duration::seconds(i + 1),
                outcome: RunOutcome::Success,
                counters: RunCounters::default(),
                item_errors: Vec::new(),
                fatal_message: None,
            };
            log.counters.scanned = i as u32;
            registry.append_run_log(log).await.unwrap();
        }

        let logs = registry.recent_run_logs(&task_id, 2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].started_at > logs[1].started_at);
    }
}
