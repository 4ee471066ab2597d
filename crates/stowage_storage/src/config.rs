//! Declarative storage location configuration.

use crate::{FileSystemStorage, MemoryStorage, StorageBackend, StorageType};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use stowage_error::{StorageError, StorageErrorKind, StowageResult};

/// Backend implementation behind a storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Files on the local filesystem
    #[display("filesystem")]
    Filesystem,
    /// Files held in memory
    #[display("memory")]
    Memory,
}

/// One `[[storages]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct StorageLocationConfig {
    /// Storage location identifier
    name: String,
    /// Backend implementation
    #[serde(default = "default_kind")]
    kind: StorageKind,
    /// Online or nearline
    #[serde(rename = "type", default = "default_type")]
    storage_type: StorageType,
    /// Root directory (filesystem kind only)
    #[serde(default)]
    path: Option<PathBuf>,
    /// Read priority, lower first
    #[serde(default)]
    priority: u32,
}

fn default_kind() -> StorageKind {
    StorageKind::Filesystem
}

fn default_type() -> StorageType {
    StorageType::Online
}

impl StorageLocationConfig {
    /// Create a configuration entry.
    pub fn new(
        name: impl Into<String>,
        kind: StorageKind,
        storage_type: StorageType,
        path: Option<PathBuf>,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            storage_type,
            path,
            priority,
        }
    }

    /// Instantiate the configured backend.
    ///
    /// # Errors
    ///
    /// Returns error if a filesystem location has no path or the directory
    /// cannot be created.
    pub fn build(&self) -> StowageResult<Arc<dyn StorageBackend>> {
        match self.kind {
            StorageKind::Filesystem => {
                let path = self.path.as_ref().ok_or_else(|| {
                    StorageError::new(StorageErrorKind::InvalidConfig(format!(
                        "filesystem storage {} needs a path",
                        self.name
                    )))
                })?;
                Ok(Arc::new(FileSystemStorage::new(path, self.storage_type)?))
            }
            StorageKind::Memory => Ok(Arc::new(MemoryStorage::new(&self.name, self.storage_type))),
        }
    }
}
