//! Task Registry port (C8)

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{DomainError, DriveId, RunLog, Task, TaskId};

#[derive(Debug, Error)]
pub enum TaskRegistryError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error(transparent)]
    Validation(#[from] DomainError),

    #[error("task registry I/O error: {0}")]
    Io(#[source] anyhow::Error),
}

/// CRUD over task definitions, plus the run-log history a task accumulates.
///
/// Validation (non-empty name, absolute output dir) happens in
/// `Task::new`/domain methods; this port only adds what needs a backing
/// store to check, such as `drive_id` existing.
#[async_trait]
pub trait TaskRegistry: Send + Sync {
    async fn create(&self, task: Task) -> Result<Task, TaskRegistryError>;

    async fn get(&self, task_id: &TaskId) -> Result<Task, TaskRegistryError>;

    async fn update(&self, task: Task) -> Result<Task, TaskRegistryError>;

    async fn delete(&self, task_id: &TaskId) -> Result<(), TaskRegistryError>;

    async fn list_for_drive(&self, drive_id: &DriveId) -> Result<Vec<Task>, TaskRegistryError>;

    async fn list_all(&self) -> Result<Vec<Task>, TaskRegistryError>;

    async fn append_run_log(&self, log: RunLog) -> Result<(), TaskRegistryError>;

    async fn recent_run_logs(
        &self,
        task_id: &TaskId,
        limit: u32,
    ) -> Result<Vec<RunLog>, TaskRegistryError>;
}
