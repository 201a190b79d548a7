//! CLI command definitions and argument parsing

use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(name = "trustsync")]
#[command(about = "Bidirectional trust sync between the trust store and the ledger")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to a TOML configuration file (default: config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the trustsync tables if they do not exist
    Init,
    /// Run both sync loops and the HTTP surface until Ctrl-C
    Serve {
        /// Host to bind (default: from config)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (default: from config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Enable CORS on the HTTP surface
        #[arg(long)]
        cors: bool,
    },
    /// Run exactly one sync cycle and print the per-item report
    #[command(subcommand)]
    Sync(SyncCommands),
    /// Show the effective configuration (database password masked)
    Config,
}

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Push updated trust scores to the ledger
    Publish {
        /// Lower bound for score updates (RFC 3339, default: 24h ago)
        #[arg(long, value_parser = parse_rfc3339)]
        since: Option<DateTime<Utc>>,
    },
    /// Copy abuse reports from the ledger into the trust store
    Harvest {
        /// Lower bound for reports (RFC 3339, default: 1h ago)
        #[arg(long, value_parser = parse_rfc3339)]
        since: Option<DateTime<Utc>>,
    },
}

fn parse_rfc3339(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp like 2024-05-01T12:00:00Z: {e}"))
}
