//! Trailmark CLI - headless host for the Trailmark SDK
//!
//! Provides commands for:
//! - Tracking custom events and page views
//! - Sending identify calls
//! - Flushing and inspecting the persisted event queue
//! - Managing consent
//! - Viewing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod host;
mod output;

use commands::{
    config::ConfigCommand, consent::ConsentCommand, flush::FlushCommand,
    identify::IdentifyCommand, queue::QueueCommand, track::TrackCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "trailmark", version, about = "Headless host for the Trailmark telemetry SDK")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track an event into the queue
    Track(TrackCommand),
    /// Send an identify call for an email
    Identify(IdentifyCommand),
    /// Deliver every queued event
    Flush(FlushCommand),
    /// Show or change consent
    #[command(subcommand)]
    Consent(ConsentCommand),
    /// Inspect or clear the persisted queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "trailmark=debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Track(cmd) => cmd.execute(format, config).await,
        Commands::Identify(cmd) => cmd.execute(format, config).await,
        Commands::Flush(cmd) => cmd.execute(format, config).await,
        Commands::Consent(cmd) => cmd.execute(format, config).await,
        Commands::Queue(cmd) => cmd.execute(format, config).await,
        Commands::Config(cmd) => cmd.execute(format, config).await,
    }
}
