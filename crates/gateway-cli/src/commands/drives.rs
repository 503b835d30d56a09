//! Drive commands - list, add, and remove configured 115 drives
//!
//! Provides the `gateway drives` CLI subcommands which:
//! 1. `list`   - Shows every configured drive, flagging the current one
//! 2. `remove` - Deletes a drive's record and its stored credential
//! 3. `use`    - Marks a drive as the current one

use anyhow::{Context, Result};
use clap::Subcommand;

use gateway_core::config::Config;
use gateway_core::domain::DriveId;
use gateway_core::ports::CredentialStore;

use crate::context::open_store;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum DrivesCommand {
    /// List configured drives
    List,
    /// Mark a drive as the current one
    Use {
        /// Drive ID, e.g. "drive115_1700000000000"
        drive_id: String,
    },
    /// Remove a drive and its stored credential
    Remove {
        drive_id: String,
    },
}

impl DrivesCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let config = Config::load_or_default(&Config::default_path());
        let store = open_store(&config).await?;

        match self {
            DrivesCommand::List => {
                let drives = store.drives.list().await.context("failed to list drives")?;

                if matches!(format, OutputFormat::Json) {
                    let json = serde_json::to_value(&drives)?;
                    fmt.print_json(&json);
                    return Ok(());
                }

                if drives.is_empty() {
                    fmt.info("No drives configured. Run 'gateway auth login' first.");
                    return Ok(());
                }

                let rows: Vec<(String, String)> = drives
                    .iter()
                    .map(|d| {
                        let marker = if d.is_current { "*" } else { " " };
                        (format!("{marker} {}", d.id), d.name.clone())
                    })
                    .collect();
                fmt.table(("drive", "name"), &rows);
            }
            DrivesCommand::Use { drive_id } => {
                let drive_id = DriveId::from(drive_id.clone());
                store.drives.set_current(&drive_id).await.context("failed to set current drive")?;
                fmt.success(&format!("{drive_id} is now the current drive"));
            }
            DrivesCommand::Remove { drive_id } => {
                let drive_id = DriveId::from(drive_id.clone());
                store.drives.delete(&drive_id).await.context("failed to remove drive")?;
                store
                    .credentials
                    .invalidate(&drive_id)
                    .await
                    .context("failed to remove stored credential")?;
                fmt.success(&format!("removed {drive_id}"));
            }
        }

        Ok(())
    }
}
