//! Auth command - device-grant QR login against the 115 open platform
//!
//! Provides the `gateway auth login` CLI command which:
//! 1. Begins a device-grant session and prints the QR payload to scan
//! 2. Polls until the session is confirmed (or expires)
//! 3. Exchanges the confirmed session for a bearer credential
//! 4. Saves the credential and registers a new drive

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use gateway_core::config::Config;
use gateway_core::domain::{AuthSession, AuthStatus, Drive, DriveId, DriveKind};
use gateway_core::ports::CredentialStore;
use gateway_drive115::auth::DeviceGrantFlow;
use tokio::time::sleep;
use tracing::info;

use crate::context::open_store;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct AuthCommand {
    /// Name to give the newly registered drive
    #[arg(long, default_value = "115")]
    pub drive_name: String,

    /// Seconds between status polls
    #[arg(long, default_value_t = 2)]
    pub poll_interval: u64,
}

impl AuthCommand {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        let config = Config::load_or_default(&Config::default_path());
        let store = open_store(&config).await?;

        let flow = Arc::new(DeviceGrantFlow::new());
        let session = flow.begin().await.context("failed to start device-grant session")?;

        fmt.info("Scan this QR payload with the 115 mobile app to confirm login:");
        fmt.info(&session.qr_payload);
        info!(uid = %session.uid, "device-grant session started");

        let confirmed = self.poll_until_confirmed(&flow, &session, &*fmt).await?;
        let credential = flow
            .exchange(&confirmed.session_id)
            .await
            .context("failed to exchange device-grant session")?;

        let drive_id = DriveId::new("drive115", now_millis());
        store.credentials.save(&drive_id, &credential).await.context("failed to save credential")?;
        let drive = store
            .drives
            .create(Drive::new(drive_id.clone(), self.drive_name.clone(), DriveKind::Drive115))
            .await
            .context("failed to register drive")?;

        if matches!(format, OutputFormat::Json) {
            fmt.print_json(&serde_json::to_value(&drive)?);
        } else {
            fmt.success(&format!("authenticated; registered drive {} ({})", drive.id, drive.name));
        }

        Ok(())
    }

    async fn poll_until_confirmed(
        &self,
        flow: &Arc<DeviceGrantFlow>,
        session: &AuthSession,
        fmt: &dyn crate::output::OutputFormatter,
    ) -> Result<AuthSession> {
        loop {
            let session = flow
                .poll(&session.session_id)
                .await
                .context("failed to poll device-grant session")?;
            match session.status {
                AuthStatus::Confirmed => return Ok(session),
                AuthStatus::Expired => bail!("device-grant session expired before confirmation"),
                AuthStatus::NotScanned | AuthStatus::Scanned => {
                    fmt.info("waiting for confirmation...");
                    sleep(Duration::from_secs(self.poll_interval)).await;
                }
            }
        }
    }
}

fn now_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis()
}
