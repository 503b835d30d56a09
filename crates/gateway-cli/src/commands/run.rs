//! Run command - execute one task's sync immediately
//!
//! Provides the `gateway run` CLI command, a one-shot equivalent of
//! `POST /api/tasks/{id}/execute`: wires a `SyncEngine` with no scheduler or
//! watcher loop, runs the task to completion, and prints the resulting
//! `RunLog`.

use anyhow::{Context, Result};
use clap::Args;

use gateway_core::config::Config;
use gateway_core::domain::{RunOutcome, TaskId};

use crate::context::{build_engine, open_store};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct RunCommand {
    /// Task to run
    pub task_id: String,
}

impl RunCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let task_id: TaskId = self.task_id.parse().context("invalid task id")?;

        let config = Config::load_or_default(&Config::default_path());
        let store = open_store(&config).await?;
        let engine = build_engine(&config, &store).await?;

        fmt.info(&format!("running task {task_id}..."));
        let log = engine.run_task(&task_id).await.context("sync run failed")?;

        if matches!(format, OutputFormat::Json) {
            fmt.print_json(&serde_json::to_value(&log)?);
            return Ok(());
        }

        match log.outcome {
            RunOutcome::Success => {
                fmt.success(&format!(
                    "created {} updated {} deleted {} skipped {} errors {}",
                    log.counters.created, log.counters.updated, log.counters.deleted, log.counters.skipped, log.counters.errors
                ));
            }
            RunOutcome::Error => {
                fmt.error(log.fatal_message.as_deref().unwrap_or("run failed"));
            }
        }

        for err in &log.item_errors {
            fmt.info(&format!("  {} - {}", err.item_id, err.message));
        }

        Ok(())
    }
}
