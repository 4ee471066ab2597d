//! Async facade over the ledger.

use crate::{
    AddReferenceOutcome, EventBus, JobExecutor, Ledger, RequestsConfig, StowageConfig,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use stowage_cache::FileCache;
use stowage_core::{
    CopyRequestItem, DeletionRequestItem, FileReference, FileReferenceEvent,
    FileReferenceEventState, FileReferenceFilter, FileRequestStatus, Job, JobReport, Page,
    PageRequest, RequestResultInfo, StorageRequestItem, StowageEvent,
};
use stowage_error::{CacheError, CacheErrorKind, CatalogError, CatalogErrorKind, StowageResult};
use stowage_storage::{StorageRegistry, StorageType};
use tokio::sync::{RwLock, RwLockReadGuard, broadcast};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Counters of one maintenance pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Copies started
    pub copies_started: usize,
    /// Jobs executed
    pub jobs: usize,
    /// Groups reported done or expired
    pub groups_reported: usize,
    /// Expired cache files removed
    pub cache_purged: usize,
}

/// Storage service: catalog, request ledger, executor and event bus.
///
/// Ledger transitions are short and serialized behind a lock; byte movement
/// runs in jobs outside of it.
///
/// # Example
///
/// ```no_run
/// use stowage_catalog::{StorageService, StowageConfig};
///
/// # async fn example() -> stowage_error::StowageResult<()> {
/// let config = StowageConfig::load()?;
/// let service = StorageService::new(&config)?;
/// let summary = service.tick(chrono::Utc::now()).await?;
/// println!("{} jobs executed", summary.jobs);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StorageService {
    ledger: Arc<RwLock<Ledger>>,
    registry: Arc<StorageRegistry>,
    executor: JobExecutor,
    events: EventBus,
    download_timeout: Duration,
}

impl StorageService {
    /// Build a service from configuration.
    #[instrument(skip(config), fields(storages = config.storages().len()))]
    pub fn new(config: &StowageConfig) -> StowageResult<Self> {
        let registry = Arc::new(StorageRegistry::from_config(config.storages())?);
        let cache = FileCache::new(config.cache().clone())?;
        info!("Storage service created");
        Ok(Self::with_parts(config.requests().clone(), registry, cache))
    }

    /// Build a service from already constructed parts.
    pub fn with_parts(settings: RequestsConfig, registry: Arc<StorageRegistry>, cache: FileCache) -> Self {
        let events = EventBus::default();
        let download_timeout = Duration::from_secs(*cache.config().download_timeout_seconds());
        let ledger = Ledger::new(settings, registry.clone(), cache, Arc::new(events.clone()));
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            executor: JobExecutor::new(registry.clone()),
            registry,
            events,
            download_timeout,
        }
    }

    /// Subscribe to file and group events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StowageEvent> {
        self.events.subscribe()
    }

    /// Read access to the ledger state.
    pub async fn ledger(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().await
    }

    /// Storage registry.
    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    /// Submit a group of files to store.
    pub async fn store(&self, items: Vec<StorageRequestItem>, group_id: &str) -> Vec<AddReferenceOutcome> {
        self.ledger.write().await.store(items, group_id, Utc::now())
    }

    /// Reference one file for one owner, inside an already granted group.
    pub async fn add_file_reference(&self, item: StorageRequestItem, group_id: &str) -> AddReferenceOutcome {
        self.ledger.write().await.add_file_reference(item, group_id)
    }

    /// Submit a group of owner removals. Returns whether it was granted.
    pub async fn delete(&self, items: Vec<DeletionRequestItem>, group_id: &str) -> bool {
        self.ledger.write().await.delete(items, group_id, Utc::now())
    }

    /// Remove one owner from a file, outside of any group.
    pub async fn remove_owner(&self, checksum: &str, storage: &str, owner: &str, force: bool) {
        self.ledger
            .write()
            .await
            .remove_owner(checksum, storage, owner, force, None)
    }

    /// Delete every file of a storage.
    pub async fn delete_all_from_storage(&self, storage: &str, force: bool, group_id: &str) -> usize {
        self.ledger
            .write()
            .await
            .delete_all_from_storage(storage, force, group_id, Utc::now())
    }

    /// Submit a group of copies.
    pub async fn copy(&self, items: Vec<CopyRequestItem>, group_id: &str) {
        self.ledger.write().await.copy(items, group_id, Utc::now())
    }

    /// Make files available, returning the number of cache requests created.
    pub async fn make_available(
        &self,
        checksums: &[String],
        expiration: Option<DateTime<Utc>>,
        group_id: &str,
    ) -> usize {
        self.ledger
            .write()
            .await
            .make_available(checksums, expiration, group_id, Utc::now())
    }

    /// Search file references.
    pub async fn search(&self, filter: &FileReferenceFilter, page: PageRequest) -> Page<FileReference> {
        self.ledger.read().await.catalog().search(filter, page)
    }

    /// Find the reference of a checksum on a storage.
    pub async fn find(&self, storage: &str, checksum: &str) -> Option<FileReference> {
        self.ledger.read().await.catalog().find(storage, checksum).cloned()
    }

    /// Results recorded so far for a live group.
    pub async fn group_results(&self, group_id: &str) -> StowageResult<Vec<RequestResultInfo>> {
        self.ledger.read().await.group_results(group_id)
    }

    /// Requeue the ERROR requests of a group.
    pub async fn retry(&self, group_id: &str) -> usize {
        self.ledger.write().await.retry(group_id)
    }

    /// Requeue the ERROR storage requests of some owners.
    pub async fn retry_by_owners(&self, owners: &[String]) -> usize {
        self.ledger.write().await.retry_by_owners(owners)
    }

    /// Check whether storage requests are queued or running on a storage.
    pub async fn is_storage_running(&self, storage: &str) -> bool {
        self.ledger.read().await.is_storage_running(storage)
    }

    /// Remove requests on a storage, optionally by status.
    pub async fn delete_requests_by_storage(&self, storage: &str, status: Option<FileRequestStatus>) -> usize {
        self.ledger
            .write()
            .await
            .delete_requests_by_storage(storage, status)
    }

    /// Claim storage requests into jobs.
    pub async fn schedule_storage_jobs(
        &self,
        status: FileRequestStatus,
        storages: &[String],
        owners: &[String],
    ) -> Vec<Job> {
        self.ledger
            .write()
            .await
            .schedule_storage_jobs(status, storages, owners)
    }

    /// Claim deletion requests into jobs.
    pub async fn schedule_deletion_jobs(&self, status: FileRequestStatus, storages: &[String]) -> Vec<Job> {
        self.ledger
            .write()
            .await
            .schedule_deletion_jobs(status, storages)
    }

    /// Claim cache requests into jobs.
    pub async fn schedule_cache_jobs(&self, status: FileRequestStatus) -> Vec<Job> {
        self.ledger.write().await.schedule_cache_jobs(status)
    }

    /// Start copies by making their sources available.
    pub async fn schedule_copy_requests(&self, status: FileRequestStatus) -> usize {
        self.ledger
            .write()
            .await
            .schedule_copy_requests(status, Utc::now())
    }

    /// Apply the report of a job executed elsewhere.
    pub async fn apply_job_report(&self, report: JobReport) -> StowageResult<()> {
        self.ledger.write().await.apply_job_report(report);
        self.evict().await
    }

    /// Execute jobs concurrently, then apply their reports.
    #[instrument(skip(self, jobs), fields(jobs = jobs.len()))]
    pub async fn run_jobs(&self, jobs: Vec<Job>) -> StowageResult<usize> {
        if jobs.is_empty() {
            return Ok(0);
        }
        let reports = join_all(jobs.iter().map(|job| self.executor.execute(job))).await;
        {
            let mut ledger = self.ledger.write().await;
            for report in reports {
                ledger.apply_job_report(report);
            }
        }
        self.evict().await?;
        debug!("Jobs applied");
        Ok(jobs.len())
    }

    /// Report done and expired groups.
    pub async fn check_groups(&self, now: DateTime<Utc>) -> usize {
        self.ledger.write().await.check_groups(now)
    }

    /// One maintenance pass: start copies, run every TO_DO job, report
    /// groups and purge the cache.
    #[instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> StowageResult<TickSummary> {
        let (copies_started, jobs) = {
            let mut ledger = self.ledger.write().await;
            let copies_started = ledger.schedule_copy_requests(FileRequestStatus::ToDo, now);
            let mut jobs = ledger.schedule_storage_jobs(FileRequestStatus::ToDo, &[], &[]);
            jobs.extend(ledger.schedule_deletion_jobs(FileRequestStatus::ToDo, &[]));
            jobs.extend(ledger.schedule_cache_jobs(FileRequestStatus::ToDo));
            (copies_started, jobs)
        };
        let jobs = self.run_jobs(jobs).await?;
        let groups_reported = self.check_groups(now).await;
        let cache_purged = self.purge_cache(now).await?;
        let summary = TickSummary {
            copies_started,
            jobs,
            groups_reported,
            cache_purged,
        };
        debug!(?summary, "Maintenance pass done");
        Ok(summary)
    }

    /// Read the content of a file.
    ///
    /// Online files are read from their storage. Nearline files are read
    /// from the cache, restoring them first if needed and waiting up to the
    /// configured download timeout.
    #[instrument(skip(self))]
    pub async fn download(&self, checksum: &str) -> StowageResult<Vec<u8>> {
        let now = Utc::now();
        let mut events = self.subscribe();
        {
            let mut ledger = self.ledger.write().await;
            let reference = ledger.best_reference(checksum).ok_or_else(|| {
                CatalogError::new(CatalogErrorKind::FileNotFound(checksum.to_string()))
            })?;
            let storage = reference.location.storage.clone();
            if self.registry.storage_type(&storage) == Some(StorageType::Online) {
                drop(ledger);
                let backend = self.registry.get(&storage).ok_or_else(|| {
                    CatalogError::new(CatalogErrorKind::UnknownStorage(storage.clone()))
                })?;
                return backend.read(&reference.location).await;
            }
            if ledger.cache().is_cached(checksum, now) {
                let path = ledger.cache().file_path(checksum)?;
                drop(ledger);
                return read_cached(&path).await;
            }
            let group_id = format!("download-{}", Uuid::new_v4());
            ledger.make_available(&[checksum.to_string()], None, &group_id, now);
            info!(%storage, "Waiting for file restoration");
        }

        let event = tokio::time::timeout(self.download_timeout, wait_availability(&mut events, checksum))
            .await
            .map_err(|_| CatalogError::new(CatalogErrorKind::DownloadTimeout(checksum.to_string())))??;
        if event.is_error() {
            let cause = event.error_cause.unwrap_or(event.message);
            return Err(CatalogError::new(CatalogErrorKind::FileUnavailable(format!("{}: {}", checksum, cause))).into());
        }
        let path = self.ledger.read().await.cache().file_path(checksum)?;
        read_cached(&path).await
    }

    /// Remove expired cache files.
    pub async fn purge_cache(&self, now: DateTime<Utc>) -> StowageResult<usize> {
        self.ledger.write().await.cache_mut().purge_expired(now).await
    }

    /// Drop cache index entries whose file vanished from disk.
    pub async fn check_cache_coherence(&self) -> usize {
        self.ledger.write().await.cache_mut().check_coherence().await
    }

    /// Remove cached files no group needs anymore.
    async fn evict(&self) -> StowageResult<()> {
        let mut ledger = self.ledger.write().await;
        for checksum in ledger.take_evictions() {
            ledger.cache_mut().remove(&checksum).await?;
            debug!(%checksum, "Cached file evicted");
        }
        Ok(())
    }
}

async fn wait_availability(
    events: &mut broadcast::Receiver<StowageEvent>,
    checksum: &str,
) -> StowageResult<FileReferenceEvent> {
    loop {
        match events.recv().await {
            Ok(StowageEvent::File(event))
                if event.checksum == checksum
                    && matches!(
                        event.state,
                        FileReferenceEventState::Available | FileReferenceEventState::AvailabilityError
                    ) =>
            {
                return Ok(event);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Download waiter lagged behind events");
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(CatalogError::new(CatalogErrorKind::FileUnavailable(format!(
                    "{}: event bus closed",
                    checksum
                )))
                .into());
            }
        }
    }
}

async fn read_cached(path: &std::path::Path) -> StowageResult<Vec<u8>> {
    tokio::fs::read(path).await.map_err(|e| {
        CacheError::new(CacheErrorKind::Io(format!("{}: {}", path.display(), e))).into()
    })
}
