//! Command-line interface module.

mod commands;
mod run;

pub use commands::{Cli, Commands};
pub use run::{check_config, load_config, purge_cache, run_maintenance};
