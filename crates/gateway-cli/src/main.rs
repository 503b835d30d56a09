//! gateway CLI - administration for the streaming-URL gateway
//!
//! Provides commands for:
//! - Registering and switching between 115 drives
//! - Defining and inspecting sync tasks
//! - Authenticating via the 115 device-grant QR flow
//! - Running a task's sync immediately
//! - Viewing recent audit events

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::auth::AuthCommand;
use commands::completions::CompletionsCommand;
use commands::drives::DrivesCommand;
use commands::logs::LogsCommand;
use commands::run::RunCommand;
use commands::tasks::TasksCommand;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "gateway", version, about = "Administration CLI for the streaming-URL gateway")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage configured 115 drives
    #[command(subcommand)]
    Drives(DrivesCommand),
    /// Manage sync tasks
    #[command(subcommand)]
    Tasks(TasksCommand),
    /// Authenticate via the 115 device-grant QR flow
    Auth(AuthCommand),
    /// Run a task's sync immediately
    Run(RunCommand),
    /// Show recent audit events
    Logs(LogsCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json { OutputFormat::Json } else { OutputFormat::Human };

    match cli.command {
        Commands::Drives(cmd) => cmd.execute(format).await,
        Commands::Tasks(cmd) => cmd.execute(format).await,
        Commands::Auth(cmd) => cmd.execute(format).await,
        Commands::Run(cmd) => cmd.execute(format).await,
        Commands::Logs(cmd) => cmd.execute(format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}
