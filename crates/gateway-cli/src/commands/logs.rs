//! Logs command - show recent audit events
//!
//! Provides the `gateway logs` CLI command, reading from the same audit
//! database `gateway-server`'s sync engine, scheduler, and watcher loops
//! write to. Filtering is by task only: the audit ledger has no path
//! dimension to filter on.

use anyhow::{Context, Result};
use clap::Args;

use gateway_core::config::Config;
use gateway_core::domain::TaskId;

use crate::context::open_audit;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct LogsCommand {
    /// Show only events for this task
    #[arg(long)]
    pub task: Option<String>,

    /// Maximum number of entries to show
    #[arg(long, default_value_t = 50)]
    pub limit: i64,
}

impl LogsCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let config = Config::load_or_default(&Config::default_path());
        let audit = open_audit(&config).await?;

        let events = if let Some(task) = &self.task {
            let task_id: TaskId = task.parse().context("invalid task id")?;
            audit.recent_for_task(&task_id, self.limit).await.context("failed to query audit log")?
        } else {
            audit.recent(self.limit).await.context("failed to query audit log")?
        };

        if matches!(format, OutputFormat::Json) {
            fmt.print_json(&serde_json::to_value(&events)?);
            return Ok(());
        }

        if events.is_empty() {
            fmt.info("No audit events recorded yet.");
            return Ok(());
        }

        fmt.info("  Recorded at               Task                                  Kind                      Message");
        fmt.info("  ------------------------- ------------------------------------- ------------------------- -------");
        for event in &events {
            let recorded = event.recorded_at.format("%Y-%m-%d %H:%M:%S");
            let task = event.task_id.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string());
            let kind = format!("{:?}", event.kind);
            let reason = event.reason.map(|r| format!(" [{r}]")).unwrap_or_default();
            fmt.info(&format!("  {recorded} {task:<37} {kind:<25} {}{reason}", event.message));
        }

        Ok(())
    }
}
