//! Registry of storage locations.

use crate::origin::read_file;
use crate::{StorageBackend, StorageLocationConfig, StorageType};
use std::collections::HashMap;
use std::sync::Arc;
use stowage_core::FileLocation;
use stowage_error::{StorageError, StorageErrorKind, StowageResult};
use url::Url;

struct RegisteredStorage {
    backend: Arc<dyn StorageBackend>,
    priority: u32,
}

/// Named storage backends with their read priorities.
///
/// A storage id absent from the registry is unknown or disabled: requests
/// targeting it go straight to ERROR.
#[derive(Default)]
pub struct StorageRegistry {
    storages: HashMap<String, RegisteredStorage>,
}

impl std::fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("storages", &self.names())
            .finish()
    }
}

impl StorageRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration entries.
    #[tracing::instrument(skip(configs), fields(count = configs.len()))]
    pub fn from_config(configs: &[StorageLocationConfig]) -> StowageResult<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(config.name(), config.build()?, *config.priority());
        }
        Ok(registry)
    }

    /// Register (or replace) a storage location.
    pub fn register(&mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>, priority: u32) {
        let name = name.into();
        tracing::info!(storage = %name, storage_type = %backend.storage_type(), priority, "Registered storage location");
        self.storages
            .insert(name, RegisteredStorage { backend, priority });
    }

    /// Backend of a storage location.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageBackend>> {
        self.storages.get(name).map(|s| Arc::clone(&s.backend))
    }

    /// Check whether a storage location is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.storages.contains_key(name)
    }

    /// Type of a storage location.
    pub fn storage_type(&self, name: &str) -> Option<StorageType> {
        self.storages.get(name).map(|s| s.backend.storage_type())
    }

    /// Priority of a storage location.
    pub fn priority(&self, name: &str) -> Option<u32> {
        self.storages.get(name).map(|s| s.priority)
    }

    /// Names of all registered storage locations, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.storages.keys().cloned().collect();
        names.sort();
        names
    }

    /// Read the bytes behind an origin URL.
    ///
    /// `file://` URLs are read from the local filesystem; `memory://{name}/...`
    /// URLs are read from the registered storage called `name`.
    #[tracing::instrument(skip(self))]
    pub async fn read_origin(&self, origin_url: &str) -> StowageResult<Vec<u8>> {
        let parsed = Url::parse(origin_url).map_err(|e| {
            StorageError::new(StorageErrorKind::InvalidUrl(format!("{}: {}", origin_url, e)))
        })?;
        match parsed.scheme() {
            "file" => read_file(origin_url).await,
            "memory" => {
                let name = parsed.host_str().unwrap_or_default();
                let backend = self.get(name).ok_or_else(|| {
                    StorageError::new(StorageErrorKind::Unavailable(format!(
                        "origin storage {} is not registered",
                        name
                    )))
                })?;
                backend.read(&FileLocation::new(name, origin_url)).await
            }
            scheme => Err(StorageError::new(StorageErrorKind::Unsupported(format!(
                "origin scheme {} in {}",
                scheme, origin_url
            )))
            .into()),
        }
    }

    /// Sort storage ids by priority (lowest first), unknown ids last.
    pub fn sort_by_priority(&self, storages: &mut [String]) {
        storages.sort_by_key(|name| (self.priority(name).unwrap_or(u32::MAX), name.clone()));
    }
}
