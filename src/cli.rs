use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ghostscan_core::config::{load_console_settings, ConfigSource, ConsoleSettings};

#[derive(Parser)]
#[command(name = "ghostscan")]
#[command(version)]
#[command(about = "GhostScan Recon Console - drive a remote discovery service from the terminal")]
#[command(long_about = "
GhostScan Console submits target ranges to a GhostScan discovery service and
keeps a live view of the devices it has mapped.

Quick start:
  1. Check the service:   ghostscan status
  2. Submit a scan:       ghostscan scan 192.168.1.1/24
  3. Live console:        ghostscan watch
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Discovery service URL (overrides GHOSTSCAN_API_URL and the config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the service status once
    Status,

    /// List the devices the service has mapped
    Devices,

    /// Submit one scan and exit
    Scan {
        /// CIDR range (e.g. 192.168.1.1/24) or comma-separated addresses
        targets: String,
    },

    /// Live console: poll telemetry and submit scans typed on stdin
    Watch {
        /// Initial target expression
        #[arg(short, long)]
        targets: Option<String>,
    },

    /// Show configuration paths and settings
    Config,
}

fn effective_settings(cli: &Cli) -> ConsoleSettings {
    let mut settings = load_console_settings();
    if let Some(url) = cli.api_url.as_deref() {
        let url = url.trim().trim_end_matches('/');
        if !url.is_empty() {
            settings.api_url = url.to_string();
            settings.source = ConfigSource::CommandLine;
        }
    }
    settings
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = effective_settings(&cli);
    tracing::debug!(
        "Discovery service {} (from {})",
        settings.api_url,
        settings.source
    );

    match &cli.command {
        Commands::Status => crate::commands::cmd_status(&settings, cli.format).await,
        Commands::Devices => crate::commands::cmd_devices(&settings, cli.format).await,
        Commands::Scan { targets } => {
            crate::commands::cmd_scan(&settings, targets, cli.format).await
        }
        Commands::Watch { targets } => {
            crate::watch::run_watch(&settings, targets.clone(), cli.format).await
        }
        Commands::Config => crate::commands::cmd_config(&settings, cli.format),
    }
}
