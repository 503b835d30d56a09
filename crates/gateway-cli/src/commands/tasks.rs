//! Task commands - list, add, remove, and inspect sync tasks
//!
//! Provides the `gateway tasks` CLI subcommands which:
//! 1. `list`   - Shows every task, its drive, and its live state
//! 2. `add`    - Creates a task for a remote subtree
//! 3. `remove` - Deletes a task definition
//! 4. `show`   - Displays one task's full configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use gateway_core::config::Config;
use gateway_core::domain::{DriveId, RemoteItemId, Task, TaskId};
use gateway_core::ports::TaskRegistry;

use crate::context::open_store;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum TasksCommand {
    /// List configured tasks
    List,
    /// Create a task mirroring a remote subtree as `.strm` stubs
    Add {
        /// Display name for the task
        name: String,
        /// Drive the source subtree belongs to
        #[arg(long)]
        drive_id: String,
        /// Remote folder ID to mirror (the drive's root is usually "0")
        #[arg(long)]
        source_root_id: String,
        /// Absolute local directory to write `.strm` stubs into
        #[arg(long)]
        output_dir: PathBuf,
        /// Enable the watcher after creation
        #[arg(long)]
        watch: bool,
    },
    /// Remove a task definition
    Remove {
        task_id: String,
    },
    /// Show one task's full configuration
    Show {
        task_id: String,
    },
}

impl TasksCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let config = Config::load_or_default(&Config::default_path());
        let store = open_store(&config).await?;

        match self {
            TasksCommand::List => {
                let tasks = store.tasks.list_all().await.context("failed to list tasks")?;

                if matches!(format, OutputFormat::Json) {
                    fmt.print_json(&serde_json::to_value(&tasks)?);
                    return Ok(());
                }

                if tasks.is_empty() {
                    fmt.info("No tasks configured. Run 'gateway tasks add' first.");
                    return Ok(());
                }

                let rows: Vec<(String, String)> = tasks
                    .iter()
                    .map(|t| (t.task_id.to_string(), format!("{} [{:?}] drive={}", t.name, t.state, t.drive_id)))
                    .collect();
                fmt.table(("task", "name [state] drive"), &rows);
            }
            TasksCommand::Add { name, drive_id, source_root_id, output_dir, watch } => {
                let mut task = Task::new(
                    TaskId::new(),
                    name.clone(),
                    DriveId::from(drive_id.clone()),
                    RemoteItemId::from(source_root_id.clone()),
                    output_dir.clone(),
                )
                .context("invalid task")?;
                task.watch.enabled = *watch;

                let created = store.tasks.create(task).await.context("failed to create task")?;
                fmt.success(&format!("created task {} ({})", created.task_id, created.name));
            }
            TasksCommand::Remove { task_id } => {
                let task_id: TaskId = task_id.parse().context("invalid task id")?;
                store.tasks.delete(&task_id).await.context("failed to remove task")?;
                fmt.success(&format!("removed task {task_id}"));
            }
            TasksCommand::Show { task_id } => {
                let task_id: TaskId = task_id.parse().context("invalid task id")?;
                let task = store.tasks.get(&task_id).await.context("failed to load task")?;

                if matches!(format, OutputFormat::Json) {
                    fmt.print_json(&serde_json::to_value(&task)?);
                    return Ok(());
                }

                fmt.success(&format!("Task {} ({})", task.name, task.task_id));
                fmt.info(&format!("Drive:       {}", task.drive_id));
                fmt.info(&format!("Source root: {}", task.source_root_id));
                fmt.info(&format!("Output dir:  {}", task.output_dir.display()));
                fmt.info(&format!("State:       {:?}", task.state));
                fmt.info(&format!("Schedule:    {:?}", task.schedule));
                fmt.info(&format!(
                    "Watch:       {} (poll every {}s)",
                    task.watch.enabled, task.watch.poll_period_seconds
                ));
                fmt.info(&format!("Total runs:  {}", task.total_runs));
                if let Some(msg) = &task.last_run_message {
                    fmt.info(&format!("Last run:    {msg}"));
                }
            }
        }

        Ok(())
    }
}
