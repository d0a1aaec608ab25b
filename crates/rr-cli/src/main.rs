use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rr_cli::commands::{cautions, inspect, replay, snapshot};
use rr_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    match &cli.command {
        Some(Commands::Inspect { file }) => inspect::run(file, &config)?,
        Some(Commands::Cautions { file, json }) => cautions::run(file, &config, *json)?,
        Some(Commands::Replay {
            file,
            rate,
            interval_ms,
            ticks,
            json,
        }) => {
            let options = replay::Options {
                rate: *rate,
                interval_ms: *interval_ms,
                ticks: *ticks,
                json: *json,
            };
            replay::run(file, &config, &options)?;
        }
        Some(Commands::Snapshot { file, at, json }) => snapshot::run(file, &config, *at, *json)?,
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
