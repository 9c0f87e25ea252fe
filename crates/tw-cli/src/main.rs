use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tw_cli::commands::{report, show};
use tw_cli::{Cli, Commands, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match &cli.command {
        Some(Commands::Show { snapshot, json }) => show::run(snapshot, *json, &config)?,
        Some(Commands::Report {
            snapshot,
            url,
            immediate,
        }) => report::run(snapshot, url.as_deref(), *immediate, &config).await?,
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
