//! CLI definitions for the `mnge` binary.

pub mod seed;
pub mod status;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Menagerie: assistant configuration and conversation engine for zoo
/// animal ambassadors.
#[derive(Debug, Parser)]
#[command(name = "mnge", version, about)]
pub struct Cli {
    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit machine-readable JSON output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the REST API server
    Serve {
        /// Bind address
        #[arg(long, default_value = "127.0.0.1", env = "MENAGERIE_HOST")]
        host: String,
        /// Bind port
        #[arg(long, default_value_t = 8080, env = "MENAGERIE_PORT")]
        port: u16,
        /// Also export traces via OpenTelemetry (stdout exporter)
        #[arg(long)]
        otel: bool,
    },

    /// Show database and configuration status
    Status,

    /// Seed demo directory data, an assistant, and an API key
    Seed,

    /// Sweep overdue sandboxes to Expired (storage hygiene; expiry is
    /// enforced on access regardless)
    Reap,

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}
