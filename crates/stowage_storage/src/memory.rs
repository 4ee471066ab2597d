//! In-memory storage backend.

use crate::origin::verify_checksum;
use crate::{StorageBackend, StorageType, StoredFile};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use stowage_core::{FileLocation, FileReferenceMetaInfo};
use stowage_error::{StorageError, StorageErrorKind, StowageResult};
use tokio::sync::RwLock;

/// Storage backend keeping file contents in memory.
///
/// URLs take the form `memory://{name}/{sub_directory}/{checksum}`; the
/// registry resolves them as origins by storage name. The backend can be
/// switched offline to simulate failures.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    name: String,
    storage_type: StorageType,
    files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    pub fn new(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self {
            name: name.into(),
            storage_type,
            files: Arc::new(RwLock::new(HashMap::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every operation fail (or succeed again).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of files held.
    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    /// Check whether the storage holds no file.
    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    fn check_online(&self) -> StowageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::new(StorageErrorKind::Unavailable(self.name.clone())).into());
        }
        Ok(())
    }

    fn url(&self, checksum: &str, sub_directory: Option<&str>) -> String {
        match sub_directory {
            Some(sub) => format!("memory://{}/{}/{}", self.name, sub.trim_matches('/'), checksum),
            None => format!("memory://{}/{}", self.name, checksum),
        }
    }

    async fn get(&self, location: &FileLocation) -> StowageResult<Vec<u8>> {
        self.files
            .read()
            .await
            .get(&location.url)
            .cloned()
            .ok_or_else(|| StorageError::new(StorageErrorKind::NotFound(location.url.clone())).into())
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStorage {
    fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    #[tracing::instrument(skip(self, data, meta_info), fields(storage = %self.name, checksum = %meta_info.checksum))]
    async fn store(
        &self,
        data: &[u8],
        meta_info: &FileReferenceMetaInfo,
        sub_directory: Option<&str>,
    ) -> StowageResult<StoredFile> {
        self.check_online()?;
        verify_checksum(data, meta_info)?;
        let url = self.url(&meta_info.checksum, sub_directory);
        let file_size = data.len() as u64;
        self.files.write().await.insert(url.clone(), data.to_vec());
        tracing::debug!(%url, size = file_size, "Stored file in memory");
        Ok(StoredFile { url, file_size })
    }

    #[tracing::instrument(skip(self), fields(storage = %self.name, url = %location.url))]
    async fn delete(&self, location: &FileLocation) -> StowageResult<()> {
        self.check_online()?;
        self.files.write().await.remove(&location.url);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(storage = %self.name, url = %location.url))]
    async fn restore(&self, location: &FileLocation, destination: &Path) -> StowageResult<u64> {
        self.check_online()?;
        let data = self.get(location).await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }
        tokio::fs::write(destination, &data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                destination.display(),
                e
            )))
        })?;
        Ok(data.len() as u64)
    }

    async fn read(&self, location: &FileLocation) -> StowageResult<Vec<u8>> {
        self.check_online()?;
        if self.storage_type == StorageType::Nearline {
            return Err(StorageError::new(StorageErrorKind::Unsupported(format!(
                "direct read on nearline storage {}",
                self.name
            )))
            .into());
        }
        self.get(location).await
    }

    async fn exists(&self, location: &FileLocation) -> StowageResult<bool> {
        self.check_online()?;
        Ok(self.files.read().await.contains_key(&location.url))
    }
}
