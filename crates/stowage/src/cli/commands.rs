//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stowage - content-addressed file reference catalog
#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "Content-addressed file reference catalog and storage request engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./stowage.toml over ~/.config/stowage/stowage.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the maintenance loop until interrupted
    Run {
        /// Seconds between two maintenance passes
        #[arg(long, default_value = "30")]
        interval: u64,
    },

    /// Remove expired files from the restoration cache
    PurgeCache,

    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_interval_defaults() {
        let cli = Cli::try_parse_from(["stowage", "run"]).unwrap();
        assert_eq!(cli.command, Commands::Run { interval: 30 });
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["stowage", "purge-cache", "--config", "/etc/stowage.toml", "-v"]).unwrap();
        assert_eq!(cli.command, Commands::PurgeCache);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/stowage.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_rejects_non_numeric_interval() {
        assert!(Cli::try_parse_from(["stowage", "run", "--interval", "soon"]).is_err());
    }
}
