//! Cache configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use stowage_error::BuilderError;

/// Configuration for the restoration cache (`[cache]` section).
///
/// # Example
///
/// ```
/// use stowage_cache::FileCacheConfig;
///
/// let config = FileCacheConfig::default().with_size_limit(1024u64);
/// assert_eq!(*config.size_limit(), 1024);
/// assert_eq!(*config.default_expiration_hours(), 24);
/// ```
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
#[setters(prefix = "with_", into)]
#[builder(
    default,
    build_fn(validate = "Self::validate", error = "BuilderError")
)]
pub struct FileCacheConfig {
    /// Root directory of the cache
    #[serde(default = "default_path")]
    path: PathBuf,

    /// Maximum total size of cached files (bytes)
    #[serde(default = "default_size_limit")]
    size_limit: u64,

    /// Expiration applied when a caller gives none (hours)
    #[serde(default = "default_expiration_hours")]
    default_expiration_hours: u64,

    /// How long `download` waits for a restoration (seconds)
    #[serde(default = "default_download_timeout_seconds")]
    download_timeout_seconds: u64,
}

fn default_path() -> PathBuf {
    std::env::temp_dir().join("stowage-cache")
}

fn default_size_limit() -> u64 {
    10 * 1024 * 1024 * 1024 // 10 GiB
}

fn default_expiration_hours() -> u64 {
    24
}

fn default_download_timeout_seconds() -> u64 {
    30
}

impl FileCacheConfigBuilder {
    fn validate(&self) -> Result<(), BuilderError> {
        if self.size_limit == Some(0) {
            return Err(BuilderError::invalid_field("size_limit", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            size_limit: default_size_limit(),
            default_expiration_hours: default_expiration_hours(),
            download_timeout_seconds: default_download_timeout_seconds(),
        }
    }
}
