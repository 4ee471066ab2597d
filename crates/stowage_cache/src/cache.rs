//! Restoration cache implementation.

use crate::FileCacheConfig;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use stowage_core::is_valid_checksum;
use stowage_error::{CacheError, CacheErrorKind, StowageResult};

/// A file restored into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct CacheFile {
    checksum: String,
    location: PathBuf,
    file_size: u64,
    storage: String,
    expiration_date: DateTime<Utc>,
    group_ids: BTreeSet<String>,
}

impl CacheFile {
    /// Check if this file expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }

    /// Push the expiration later. Earlier dates are ignored.
    ///
    /// Returns `true` if the expiration changed.
    pub fn extend(&mut self, expiration_date: DateTime<Utc>) -> bool {
        if expiration_date > self.expiration_date {
            self.expiration_date = expiration_date;
            true
        } else {
            false
        }
    }
}

/// Index of the files restored into the cache directory.
///
/// Files live at `{path}/{c[0:2]}/{c[2:4]}/{c[4:6]}/{checksum}`.
///
/// # Example
///
/// ```
/// use chrono::{Duration, Utc};
/// use stowage_cache::{FileCache, FileCacheConfig};
///
/// let dir = std::env::temp_dir().join("stowage-cache-doc");
/// let mut cache = FileCache::new(FileCacheConfig::default().with_path(dir.clone())).unwrap();
///
/// let path = cache.file_path("abcdef123").unwrap();
/// assert_eq!(path, dir.join("ab").join("cd").join("ef").join("abcdef123"));
/// assert!(cache.file_path("../abc").is_err());
///
/// cache.register("abcdef123", 42, "nearline-1", Utc::now() + Duration::hours(1), None).unwrap();
/// assert!(cache.is_cached("abcdef123", Utc::now()));
/// assert_eq!(cache.occupied_size(), 42);
/// ```
#[derive(Debug)]
pub struct FileCache {
    config: FileCacheConfig,
    files: HashMap<String, CacheFile>,
}

impl FileCache {
    /// Create the cache, creating its root directory if needed.
    #[tracing::instrument(skip(config), fields(path = %config.path().display(), size_limit = config.size_limit()))]
    pub fn new(config: FileCacheConfig) -> StowageResult<Self> {
        std::fs::create_dir_all(config.path()).map_err(|e| {
            CacheError::new(CacheErrorKind::Directory(format!(
                "{}: {}",
                config.path().display(),
                e
            )))
        })?;
        tracing::debug!("Created file cache");
        Ok(Self {
            config,
            files: HashMap::new(),
        })
    }

    /// Cache configuration.
    pub fn config(&self) -> &FileCacheConfig {
        &self.config
    }

    /// Directory a file is restored into.
    ///
    /// # Errors
    ///
    /// Returns [`CacheErrorKind::InvalidChecksum`] when the checksum is not
    /// plain ASCII alphanumeric.
    pub fn restoration_directory(&self, checksum: &str) -> StowageResult<PathBuf> {
        if !is_valid_checksum(checksum) {
            return Err(CacheError::new(CacheErrorKind::InvalidChecksum(format!("{:?}", checksum))).into());
        }
        let mut path = self.config.path().clone();
        for level in 0..3 {
            if let Some(part) = checksum.get(level * 2..level * 2 + 2) {
                path.push(part);
            }
        }
        Ok(path)
    }

    /// Full path of a cached file.
    pub fn file_path(&self, checksum: &str) -> StowageResult<PathBuf> {
        Ok(self.restoration_directory(checksum)?.join(checksum))
    }

    /// Look up a cached file.
    pub fn get(&self, checksum: &str) -> Option<&CacheFile> {
        self.files.get(checksum)
    }

    /// Check whether a non-expired copy is cached.
    pub fn is_cached(&self, checksum: &str, now: DateTime<Utc>) -> bool {
        self.files
            .get(checksum)
            .is_some_and(|file| !file.is_expired(now))
    }

    /// Register a restored file.
    ///
    /// An existing entry keeps the later expiration and accumulates group ids.
    #[tracing::instrument(skip(self))]
    pub fn register(
        &mut self,
        checksum: &str,
        file_size: u64,
        storage: &str,
        expiration_date: DateTime<Utc>,
        group_id: Option<&str>,
    ) -> StowageResult<&CacheFile> {
        let location = self.file_path(checksum)?;
        let file = self
            .files
            .entry(checksum.to_string())
            .and_modify(|file| {
                file.extend(expiration_date);
                file.file_size = file_size;
                file.storage = storage.to_string();
            })
            .or_insert_with(|| CacheFile {
                checksum: checksum.to_string(),
                location,
                file_size,
                storage: storage.to_string(),
                expiration_date,
                group_ids: BTreeSet::new(),
            });
        if let Some(group_id) = group_id {
            file.group_ids.insert(group_id.to_string());
        }
        tracing::debug!(expiration = %file.expiration_date, "Registered cached file");
        Ok(file)
    }

    /// Extend the expiration of a cached file and record a group using it.
    ///
    /// Returns `false` if the file is not cached.
    pub fn touch(&mut self, checksum: &str, expiration_date: DateTime<Utc>, group_id: Option<&str>) -> bool {
        match self.files.get_mut(checksum) {
            Some(file) => {
                file.extend(expiration_date);
                if let Some(group_id) = group_id {
                    file.group_ids.insert(group_id.to_string());
                }
                true
            }
            None => false,
        }
    }

    /// Forget that a group uses a cached file.
    ///
    /// Returns `true` if other groups still use it.
    pub fn release_group(&mut self, checksum: &str, group_id: &str) -> bool {
        match self.files.get_mut(checksum) {
            Some(file) => {
                file.group_ids.remove(group_id);
                !file.group_ids.is_empty()
            }
            None => false,
        }
    }

    /// Total size of cached files.
    pub fn occupied_size(&self) -> u64 {
        self.files.values().map(|file| file.file_size).sum()
    }

    /// Space left before the size limit.
    pub fn free_space(&self) -> u64 {
        self.config.size_limit().saturating_sub(self.occupied_size())
    }

    /// Remove a cached file from disk and index.
    ///
    /// Returns `true` if the file was cached.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&mut self, checksum: &str) -> StowageResult<bool> {
        let Some(file) = self.files.remove(checksum) else {
            return Ok(false);
        };
        remove_from_disk(&file.location).await?;
        tracing::debug!(path = %file.location.display(), "Removed cached file");
        Ok(true)
    }

    /// Remove every file expired at `now`.
    ///
    /// Returns the number of files removed.
    #[tracing::instrument(skip(self), fields(cache_size = self.files.len()))]
    pub async fn purge_expired(&mut self, now: DateTime<Utc>) -> StowageResult<usize> {
        let expired: Vec<String> = self
            .files
            .values()
            .filter(|file| file.is_expired(now))
            .map(|file| file.checksum.clone())
            .collect();
        for checksum in &expired {
            self.remove(checksum).await?;
        }
        if !expired.is_empty() {
            tracing::info!(removed = expired.len(), remaining = self.files.len(), "Purged expired cache files");
        }
        Ok(expired.len())
    }

    /// Drop index entries whose file vanished from disk.
    ///
    /// Returns the number of entries dropped.
    #[tracing::instrument(skip(self))]
    pub async fn check_coherence(&mut self) -> usize {
        let mut missing = Vec::new();
        for file in self.files.values() {
            if !tokio::fs::try_exists(&file.location).await.unwrap_or(false) {
                missing.push(file.checksum.clone());
            }
        }
        for checksum in &missing {
            tracing::warn!(checksum = %checksum, "Cached file missing on disk, dropping entry");
            self.files.remove(checksum);
        }
        missing.len()
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

async fn remove_from_disk(path: &Path) -> StowageResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::new(CacheErrorKind::Io(format!("delete {}: {}", path.display(), e))).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn cache(dir: &Path) -> FileCache {
        FileCache::new(FileCacheConfig::default().with_path(dir).with_size_limit(100u64)).unwrap()
    }

    #[test]
    fn test_expiration_only_moves_later() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = cache(dir.path());
        let now = Utc::now();

        cache.register("abc123", 10, "nearline-1", now + Duration::hours(5), Some("g1")).unwrap();
        cache.touch("abc123", now + Duration::hours(1), Some("g2"));
        assert_eq!(*cache.get("abc123").unwrap().expiration_date(), now + Duration::hours(5));

        cache.touch("abc123", now + Duration::hours(9), None);
        assert_eq!(*cache.get("abc123").unwrap().expiration_date(), now + Duration::hours(9));
        assert_eq!(cache.get("abc123").unwrap().group_ids().len(), 2);
    }

    #[test]
    fn test_free_space() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = cache(dir.path());
        let later = Utc::now() + Duration::hours(1);
        cache.register("aaaaaa", 60, "n", later, None).unwrap();
        cache.register("bbbbbb", 30, "n", later, None).unwrap();
        assert_eq!(cache.free_space(), 10);
        cache.register("cccccc", 30, "n", later, None).unwrap();
        assert_eq!(cache.free_space(), 0);
    }

    #[test]
    fn test_rejects_checksums_leaving_the_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = cache(dir.path());
        let later = Utc::now() + Duration::hours(1);
        for checksum in ["../../escaped", "ab/../../x", ""] {
            assert!(cache.restoration_directory(checksum).is_err());
            assert!(cache.file_path(checksum).is_err());
            assert!(cache.register(checksum, 1, "n", later, None).is_err());
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_release_group() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cache = cache(dir.path());
        let later = Utc::now() + Duration::hours(1);
        cache.register("abc123", 1, "n", later, Some("g1")).unwrap();
        cache.register("abc123", 1, "n", later, Some("g2")).unwrap();
        assert!(cache.release_group("abc123", "g1"));
        assert!(!cache.release_group("abc123", "g2"));
    }
}
