pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tokenlens",
    version,
    about = "Token consumption analytics for Snowflake Cortex AI workloads"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the dashboard server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Open the dashboard in the default browser
        #[arg(long)]
        open: bool,
    },
    /// Print a one-shot usage report to the terminal
    Report {
        /// Only include queries issued by this user
        #[arg(long)]
        user: Option<String>,
        /// Only include calls to this model
        #[arg(long)]
        model: Option<String>,
        /// Only include calls through this function
        #[arg(long)]
        function: Option<String>,
        /// Maximum number of rows to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Pick the default connection profile interactively
    Init,
}
