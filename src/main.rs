mod cli;
mod config;
mod insights;
mod server;
mod usage;
mod warehouse;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, open } => cli::commands::serve::run(port, open).await,
        Commands::Report {
            user,
            model,
            function,
            limit,
        } => cli::commands::report::run(user, model, function, limit).await,
        Commands::Init => cli::commands::init::run().await,
    }
}
