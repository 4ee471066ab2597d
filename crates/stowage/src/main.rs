//! Stowage CLI binary.
//!
//! This binary drives a storage service built from configuration:
//! - Run the maintenance loop that executes queued requests
//! - Purge expired files from the restoration cache
//! - Validate the configuration

use clap::Parser;
use stowage::{ObservabilityConfig, init_observability_with_config};

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, check_config, load_config, purge_cache, run_maintenance};

    let cli = Cli::parse();

    let mut observability = ObservabilityConfig::default().with_json_logs(cli.json_logs);
    if cli.verbose {
        observability = observability.with_log_level("debug");
    }
    init_observability_with_config(observability)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { interval } => {
            run_maintenance(&config, interval).await?;
        }

        Commands::PurgeCache => {
            purge_cache(&config).await?;
        }

        Commands::CheckConfig => {
            check_config(&config);
        }
    }

    Ok(())
}
