//! Command handlers.

use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use stowage::{StorageService, StowageConfig, StowageResult};
use tracing::{error, info, warn};

/// Load configuration from a file, or from the default locations.
pub fn load_config(path: Option<&Path>) -> StowageResult<StowageConfig> {
    match path {
        Some(path) => {
            info!(config_file = %path.display(), "Loading configuration");
            StowageConfig::from_file(path)
        }
        None => StowageConfig::load(),
    }
}

/// Handle the `run` command
pub async fn run_maintenance(config: &StowageConfig, interval_seconds: u64) -> StowageResult<()> {
    let service = StorageService::new(config)?;
    let dropped = service.check_cache_coherence().await;
    info!(
        storages = config.storages().len(),
        interval_seconds,
        dropped_cache_entries = dropped,
        "Maintenance loop starting. Press Ctrl+C to stop."
    );

    let mut timer = tokio::time::interval(Duration::from_secs(interval_seconds.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                match service.tick(Utc::now()).await {
                    Ok(summary) if summary.jobs > 0 || summary.groups_reported > 0 => {
                        info!(
                            jobs = summary.jobs,
                            copies_started = summary.copies_started,
                            groups_reported = summary.groups_reported,
                            cache_purged = summary.cache_purged,
                            "Maintenance pass done"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Maintenance pass failed"),
                }
            }
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                break;
            }
        }
    }

    info!("Shutdown signal received, maintenance loop stopped");
    Ok(())
}

/// Handle the `purge-cache` command
pub async fn purge_cache(config: &StowageConfig) -> StowageResult<()> {
    let service = StorageService::new(config)?;
    let dropped = service.check_cache_coherence().await;
    let purged = service.purge_cache(Utc::now()).await?;
    println!("Purged {} expired cache file(s), dropped {} stale entrie(s)", purged, dropped);
    Ok(())
}

/// Handle the `check-config` command
pub fn check_config(config: &StowageConfig) {
    println!("Configuration OK");
    println!("  requests per job: {}", config.requests().requests_per_job());
    println!(
        "  cache: {} (limit {} bytes)",
        config.cache().path().display(),
        config.cache().size_limit()
    );
    if config.storages().is_empty() {
        println!("  no storage configured");
    }
    for storage in config.storages() {
        println!(
            "  storage {}: {} {} (priority {})",
            storage.name(),
            storage.kind(),
            storage.storage_type(),
            storage.priority()
        );
    }
}
