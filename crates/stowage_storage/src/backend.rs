//! Storage backend trait definition.

use serde::{Deserialize, Serialize};
use std::path::Path;
use stowage_core::{FileLocation, FileReferenceMetaInfo};
use stowage_error::StowageResult;

/// Whether stored content can be read directly.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Content readable right after store
    #[display("ONLINE")]
    Online,
    /// Content must be restored into the cache before reading
    #[display("NEARLINE")]
    Nearline,
}

/// Result of a successful store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Backend-specific URL of the stored file
    pub url: String,
    /// Real size in bytes
    pub file_size: u64,
}

/// Trait for pluggable storage backends.
///
/// Implementations only move bytes. Bookkeeping of who references what lives
/// in the catalog.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Whether stored content is directly readable.
    fn storage_type(&self) -> StorageType;

    /// Store file content.
    ///
    /// # Arguments
    ///
    /// * `data` - The file content, already read from its origin
    /// * `meta_info` - Metadata of the file, checksum included
    /// * `sub_directory` - Optional destination sub-directory
    ///
    /// # Returns
    ///
    /// The URL of the stored file and its real size
    async fn store(
        &self,
        data: &[u8],
        meta_info: &FileReferenceMetaInfo,
        sub_directory: Option<&str>,
    ) -> StowageResult<StoredFile>;

    /// Delete the file at `location`.
    async fn delete(&self, location: &FileLocation) -> StowageResult<()>;

    /// Restore the file at `location` into `destination`, returning its size.
    async fn restore(&self, location: &FileLocation, destination: &Path) -> StowageResult<u64>;

    /// Read the file at `location`. Only online backends support this.
    async fn read(&self, location: &FileLocation) -> StowageResult<Vec<u8>>;

    /// Check if the file at `location` exists.
    async fn exists(&self, location: &FileLocation) -> StowageResult<bool>;
}
