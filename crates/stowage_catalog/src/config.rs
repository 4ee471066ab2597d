//! Configuration for the Stowage engine.
//!
//! The configuration system supports:
//! - Bundled defaults (include_str! from stowage.toml)
//! - User overrides (~/.config/stowage/stowage.toml, then ./stowage.toml)
//! - Explicit files via [`StowageConfig::from_file`]

use chrono::{DateTime, Duration, Utc};
use config::{Config, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use stowage_cache::FileCacheConfig;
use stowage_core::FileRequestType;
use stowage_error::{BuilderError, ConfigError, StowageError, StowageResult};
use stowage_storage::StorageLocationConfig;
use tracing::{debug, instrument};

/// Upper bound of any configured expiration (100 years).
const MAX_EXPIRATION_DAYS: u32 = 365 * 100;

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../../../stowage.toml");

/// Request ledger settings (`[requests]` section).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(
    default,
    build_fn(validate = "Self::validate", error = "BuilderError")
)]
pub struct RequestsConfig {
    /// Days before a storage group expires
    #[serde(default = "default_expiration_days")]
    storage_expiration_days: u32,

    /// Days before a deletion group expires
    #[serde(default = "default_expiration_days")]
    deletion_expiration_days: u32,

    /// Days before a copy group expires
    #[serde(default = "default_expiration_days")]
    copy_expiration_days: u32,

    /// Days before an availability group expires
    #[serde(default = "default_expiration_days")]
    cache_expiration_days: u32,

    /// Days after which any unfinished group is abandoned (0 disables)
    #[serde(default = "default_group_expiration_days")]
    group_expiration_days: u32,

    /// Maximum number of requests per job
    #[serde(default = "default_requests_per_job")]
    requests_per_job: usize,
}

fn default_expiration_days() -> u32 {
    5
}

fn default_group_expiration_days() -> u32 {
    2
}

fn default_requests_per_job() -> usize {
    100
}

impl RequestsConfigBuilder {
    fn validate(&self) -> Result<(), BuilderError> {
        if self.requests_per_job == Some(0) {
            return Err(BuilderError::invalid_field("requests_per_job", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for RequestsConfig {
    fn default() -> Self {
        Self {
            storage_expiration_days: default_expiration_days(),
            deletion_expiration_days: default_expiration_days(),
            copy_expiration_days: default_expiration_days(),
            cache_expiration_days: default_expiration_days(),
            group_expiration_days: default_group_expiration_days(),
            requests_per_job: default_requests_per_job(),
        }
    }
}

impl RequestsConfig {
    /// Expiration date of a group of the given kind granted at `now`.
    pub fn group_expiration(&self, request_type: FileRequestType, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let days = match request_type {
            FileRequestType::Storage => self.storage_expiration_days,
            FileRequestType::Deletion => self.deletion_expiration_days,
            FileRequestType::Copy => self.copy_expiration_days,
            FileRequestType::Cache => self.cache_expiration_days,
        };
        if days == 0 {
            return None;
        }
        now.checked_add_signed(Duration::days(i64::from(days.min(MAX_EXPIRATION_DAYS))))
    }

    /// Whether a group created at `creation` is too old at `now`.
    pub fn group_too_old(&self, creation: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let days = self.group_expiration_days.min(MAX_EXPIRATION_DAYS);
        days > 0
            && now
                .checked_sub_signed(Duration::days(i64::from(days)))
                .is_some_and(|limit| creation < limit)
    }
}

/// Complete Stowage configuration.
///
/// # Example
///
/// ```toml
/// [requests]
/// requests_per_job = 50
///
/// [cache]
/// path = "/var/cache/stowage"
///
/// [[storages]]
/// name = "online-1"
/// kind = "filesystem"
/// type = "online"
/// path = "/var/lib/stowage/online-1"
/// priority = 0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct StowageConfig {
    /// Request ledger settings
    #[serde(default)]
    requests: RequestsConfig,

    /// Restoration cache settings
    #[serde(default)]
    cache: FileCacheConfig,

    /// Configured storage locations
    #[serde(default)]
    storages: Vec<StorageLocationConfig>,
}

impl StowageConfig {
    /// Create a configuration from its parts.
    pub fn new(
        requests: RequestsConfig,
        cache: FileCacheConfig,
        storages: Vec<StorageLocationConfig>,
    ) -> Self {
        Self {
            requests,
            cache,
            storages,
        }
    }

    /// Load configuration from bundled defaults merged with user overrides.
    ///
    /// Precedence (highest first): `./stowage.toml`,
    /// `~/.config/stowage/stowage.toml`, bundled defaults.
    #[instrument]
    pub fn load() -> StowageResult<Self> {
        debug!("Loading configuration with precedence: current dir > home dir > bundled defaults");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/stowage/stowage.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("stowage").required(false));

        Self::build(builder, None)
    }

    /// Load configuration from bundled defaults overridden by one file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> StowageResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::in_file(path.display().to_string(), "file does not exist").into());
        }
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from(path).format(FileFormat::Toml));
        Self::build(builder, Some(path))
    }

    /// Parse configuration from a TOML string layered over the bundled defaults.
    pub fn from_toml(content: &str) -> StowageResult<Self> {
        let builder = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .add_source(File::from_str(content, FileFormat::Toml));
        Self::build(builder, None)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        path: Option<&Path>,
    ) -> StowageResult<Self> {
        let wrap = |message: String| -> StowageError {
            match path {
                Some(path) => ConfigError::in_file(path.display().to_string(), message).into(),
                None => ConfigError::new(message).into(),
            }
        };
        let config: Self = builder
            .build()
            .map_err(|e| wrap(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| wrap(format!("Failed to parse configuration: {}", e)))?;
        config.validate().map_err(wrap)?;
        debug!(storages = config.storages.len(), "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.requests.requests_per_job == 0 {
            return Err("requests.requests_per_job must be greater than 0".to_string());
        }
        let mut names = std::collections::HashSet::new();
        for storage in &self.storages {
            if !names.insert(storage.name()) {
                return Err(format!("storage {} is declared twice", storage.name()));
            }
        }
        Ok(())
    }
}
