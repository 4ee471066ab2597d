//! Filesystem storage backend.
//!
//! Files are laid out by checksum under the storage root:
//! `{base_path}/{sub_directory}/{checksum[0:2]}/{checksum[2:4]}/{checksum}`.

use crate::origin::{file_path, verify_checksum};
use crate::{StorageBackend, StorageType, StoredFile};
use std::path::{Component, Path, PathBuf};
use stowage_core::{FileLocation, FileReferenceMetaInfo, is_valid_checksum};
use stowage_error::{StorageError, StorageErrorKind, StowageResult};
use url::Url;

/// Filesystem storage backend.
///
/// # Example Structure
///
/// ```text
/// /var/stowage/online-1/
/// ├── ab/
/// │   └── c1/
/// │       └── abc123...
/// └── invoices/
///     └── 12/
///         └── 34/
///             └── 123456...
/// ```
///
/// A nearline filesystem storage behaves the same on disk but refuses direct
/// reads; content must be restored into the cache first.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    base_path: PathBuf,
    storage_type: StorageType,
}

impl FileSystemStorage {
    /// Create a new filesystem storage backend.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or accessed.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>, storage_type: StorageType) -> StowageResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;
        let base_path = std::fs::canonicalize(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), %storage_type, "Created filesystem storage");
        Ok(Self {
            base_path,
            storage_type,
        })
    }

    /// Root directory of the storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of a file in the storage.
    fn get_path(&self, checksum: &str, sub_directory: Option<&str>) -> StowageResult<PathBuf> {
        if !is_valid_checksum(checksum) {
            return Err(StorageError::new(StorageErrorKind::InvalidUrl(format!(
                "checksum {:?} cannot name a file",
                checksum
            )))
            .into());
        }
        let mut path = self.base_path.clone();
        if let Some(sub_directory) = sub_directory {
            let relative = Path::new(sub_directory);
            if !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            {
                return Err(StorageError::new(StorageErrorKind::InvalidUrl(format!(
                    "sub-directory {} escapes the storage root",
                    sub_directory
                )))
                .into());
            }
            path.push(relative);
        }
        if let (Some(first), Some(second)) = (checksum.get(0..2), checksum.get(2..4)) {
            path.push(first);
            path.push(second);
        }
        Ok(path.join(checksum))
    }

    /// Resolve a location URL to a path inside the storage root.
    fn resolve(&self, location: &FileLocation) -> StowageResult<PathBuf> {
        let path = file_path(&location.url)?;
        let inside = path.strip_prefix(&self.base_path).is_ok_and(|relative| {
            relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        });
        if !inside {
            return Err(StorageError::new(StorageErrorKind::InvalidUrl(format!(
                "{} is outside {}",
                location.url,
                self.base_path.display()
            )))
            .into());
        }
        Ok(path)
    }
}

#[async_trait::async_trait]
impl StorageBackend for FileSystemStorage {
    fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    #[tracing::instrument(skip(self, data, meta_info), fields(size = data.len(), checksum = %meta_info.checksum))]
    async fn store(
        &self,
        data: &[u8],
        meta_info: &FileReferenceMetaInfo,
        sub_directory: Option<&str>,
    ) -> StowageResult<StoredFile> {
        let path = self.get_path(&meta_info.checksum, sub_directory)?;
        let url = Url::from_file_path(&path)
            .map_err(|_| {
                StorageError::new(StorageErrorKind::InvalidUrl(path.display().to_string()))
            })?
            .to_string();

        verify_checksum(data, meta_info)?;
        let file_size = data.len() as u64;

        // Same checksum at the same path means the same content
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(path = %path.display(), "File already present, keeping it");
            return Ok(StoredFile { url, file_size });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;
        tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            )))
        })?;

        tracing::info!(path = %path.display(), size = file_size, "Stored file");
        Ok(StoredFile { url, file_size })
    }

    #[tracing::instrument(skip(self), fields(url = %location.url))]
    async fn delete(&self, location: &FileLocation) -> StowageResult<()> {
        let path = self.resolve(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Deleted file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "File already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "delete {}: {}",
                path.display(),
                e
            )))
            .into()),
        }
    }

    #[tracing::instrument(skip(self, destination), fields(url = %location.url, destination = %destination.display()))]
    async fn restore(&self, location: &FileLocation, destination: &Path) -> StowageResult<u64> {
        let path = self.resolve(location)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }
        let size = tokio::fs::copy(&path, destination).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(location.url.clone()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "copy {} to {}: {}",
                    path.display(),
                    destination.display(),
                    e
                )))
            }
        })?;
        tracing::debug!(size, "Restored file");
        Ok(size)
    }

    #[tracing::instrument(skip(self), fields(url = %location.url))]
    async fn read(&self, location: &FileLocation) -> StowageResult<Vec<u8>> {
        if self.storage_type == StorageType::Nearline {
            return Err(StorageError::new(StorageErrorKind::Unsupported(format!(
                "direct read on nearline storage {}",
                location.storage
            )))
            .into());
        }
        let path = self.resolve(location)?;
        let data = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::new(StorageErrorKind::NotFound(location.url.clone()))
            } else {
                StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        })?;
        Ok(data)
    }

    async fn exists(&self, location: &FileLocation) -> StowageResult<bool> {
        let path = self.resolve(location)?;
        Ok(tokio::fs::try_exists(path).await.unwrap_or(false))
    }
}
