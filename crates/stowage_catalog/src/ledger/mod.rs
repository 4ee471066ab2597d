//! The request ledger: catalog, requests, groups and cache index.
//!
//! Every mutation is a short synchronous transition on [`Ledger`]; the
//! [`StorageService`](crate::StorageService) serializes them behind a lock
//! and performs all byte movement outside of it.

mod cache;
mod copy;
mod deletion;
mod jobs;
mod storage;

pub use storage::AddReferenceOutcome;

use crate::reconcile::{ReferenceChange, SideEffect, Transition};
use crate::{EventPublisher, FileCatalog, GroupTracker, RequestTable, RequestsConfig};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use stowage_cache::FileCache;
use stowage_core::{
    FileCacheRequest, FileCopyRequest, FileDeletionRequest, FileReferenceEvent, FileRequest,
    FileRequestStatus, FileRequestType, FileRequestsGroupEvent, FileStorageRequest, JobId,
    RequestId, RequestResultInfo, StowageEvent,
};
use stowage_error::{CatalogError, CatalogErrorKind, StowageResult};
use stowage_storage::StorageRegistry;

/// Shared mutable state of the engine.
pub struct Ledger {
    settings: RequestsConfig,
    registry: Arc<StorageRegistry>,
    publisher: Arc<dyn EventPublisher>,
    catalog: FileCatalog,
    storage_requests: RequestTable<FileStorageRequest>,
    deletion_requests: RequestTable<FileDeletionRequest>,
    copy_requests: RequestTable<FileCopyRequest>,
    cache_requests: RequestTable<FileCacheRequest>,
    groups: GroupTracker,
    cache: FileCache,
    next_request_id: u64,
    next_job_id: u64,
    evictions: Vec<String>,
    cache_full_warned: bool,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("references", &self.catalog.len())
            .field("storage_requests", &self.storage_requests.len())
            .field("deletion_requests", &self.deletion_requests.len())
            .field("copy_requests", &self.copy_requests.len())
            .field("cache_requests", &self.cache_requests.len())
            .field("cached_files", &self.cache.len())
            .finish()
    }
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new(
        settings: RequestsConfig,
        registry: Arc<StorageRegistry>,
        cache: FileCache,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            settings,
            registry,
            publisher,
            catalog: FileCatalog::new(),
            storage_requests: RequestTable::default(),
            deletion_requests: RequestTable::default(),
            copy_requests: RequestTable::default(),
            cache_requests: RequestTable::default(),
            groups: GroupTracker::new(),
            cache,
            next_request_id: 1,
            next_job_id: 1,
            evictions: Vec::new(),
            cache_full_warned: false,
        }
    }

    /// File reference catalog.
    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    /// Storage requests.
    pub fn storage_requests(&self) -> &RequestTable<FileStorageRequest> {
        &self.storage_requests
    }

    /// Deletion requests.
    pub fn deletion_requests(&self) -> &RequestTable<FileDeletionRequest> {
        &self.deletion_requests
    }

    /// Copy requests.
    pub fn copy_requests(&self) -> &RequestTable<FileCopyRequest> {
        &self.copy_requests
    }

    /// Cache requests.
    pub fn cache_requests(&self) -> &RequestTable<FileCacheRequest> {
        &self.cache_requests
    }

    /// Restoration cache index.
    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Mutable restoration cache index.
    pub fn cache_mut(&mut self) -> &mut FileCache {
        &mut self.cache
    }

    /// Storage registry.
    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    /// Cached files no group needs anymore, to be removed from disk.
    pub fn take_evictions(&mut self) -> Vec<String> {
        std::mem::take(&mut self.evictions)
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    fn next_job_id(&mut self) -> JobId {
        let id = JobId(self.next_job_id);
        self.next_job_id += 1;
        id
    }

    /// Publish a file event and let pending copies react to it.
    fn emit(&mut self, event: FileReferenceEvent) {
        self.publisher.publish(StowageEvent::File(event.clone()));
        self.route_copy_event(&event);
    }

    fn publish_group(&self, event: FileRequestsGroupEvent) {
        self.publisher.publish(StowageEvent::Group(event));
    }

    fn grant(&mut self, group_id: &str, request_type: FileRequestType, now: DateTime<Utc>) {
        let expiration = self.settings.group_expiration(request_type, now);
        if let Some(event) = self.groups.grant(group_id, request_type, expiration) {
            self.publish_group(event);
        }
    }

    fn add_result(&mut self, result: RequestResultInfo) {
        self.groups.add_result(result);
    }

    /// Apply a transition computed by [`reconcile`](crate::reconcile::reconcile).
    fn apply_transition(&mut self, transition: Transition, group_id: Option<&str>) {
        match transition.reference {
            ReferenceChange::Unchanged => {}
            ReferenceChange::Upsert(reference) => self.catalog.upsert(reference),
            ReferenceChange::Remove(key) => {
                if self.catalog.remove(&key).is_some() {
                    tracing::info!(%key, "File reference removed");
                }
            }
        }
        for effect in transition.effects {
            match effect {
                SideEffect::Publish(event) => self.emit(event),
                SideEffect::ReleaseDelayed(key) => self.release_delayed(&key),
                SideEffect::DropCacheRequests(key) => {
                    let dropped = self.cache_requests.remove_where(|r| {
                        r.location.storage == key.storage && r.meta_info.checksum == key.checksum
                    });
                    if !dropped.is_empty() {
                        tracing::debug!(%key, count = dropped.len(), "[CACHE REQUESTS] Dropped cache requests of deleted file");
                    }
                }
                SideEffect::DropDeletionRequest(key) => {
                    if let Some(id) = self.deletion_requests.by_key(&key).map(|r| r.id()) {
                        self.deletion_requests.remove(id);
                        tracing::debug!(%key, "[DELETION REQUESTS] Dropped deletion request");
                    }
                }
                SideEffect::RequestDeletion { key, force } => {
                    self.create_deletion_request(&key, force, group_id)
                }
            }
        }
    }

    /// Check every live group, reporting done and expired ones.
    ///
    /// A group is done when no non-ERROR request of its kind carries its id.
    /// An unfinished group past its expiration is dropped for reporting; its
    /// requests are left untouched.
    #[tracing::instrument(skip(self))]
    pub fn check_groups(&mut self, now: DateTime<Utc>) -> usize {
        let groups: Vec<(String, FileRequestType, bool)> = self
            .groups
            .groups()
            .map(|g| {
                let expired = g.is_expired(now) || self.settings.group_too_old(g.creation_date, now);
                (g.id.clone(), g.request_type, expired)
            })
            .collect();
        let mut reported = 0;
        for (id, request_type, expired) in groups {
            let event = if !self.has_live_request(&id, request_type) {
                self.groups.complete(&id)
            } else if expired {
                self.groups.expire(&id)
            } else {
                None
            };
            if let Some(event) = event {
                self.publish_group(event);
                reported += 1;
            }
        }
        reported
    }

    fn has_live_request(&self, group_id: &str, request_type: FileRequestType) -> bool {
        fn live<R: FileRequest>(request: &R, group_id: &str) -> bool {
            request.in_group(group_id) && request.status() != FileRequestStatus::Error
        }
        match request_type {
            FileRequestType::Storage => self.storage_requests.iter().any(|r| live(r, group_id)),
            FileRequestType::Deletion => self.deletion_requests.iter().any(|r| live(r, group_id)),
            FileRequestType::Copy => self.copy_requests.iter().any(|r| live(r, group_id)),
            FileRequestType::Cache => self.cache_requests.iter().any(|r| live(r, group_id)),
        }
    }

    /// Results recorded so far for a live group.
    pub fn group_results(&self, group_id: &str) -> StowageResult<Vec<RequestResultInfo>> {
        self.groups.results(group_id).ok_or_else(|| {
            CatalogError::new(CatalogErrorKind::UnknownGroup(group_id.to_string())).into()
        })
    }

    /// Move every ERROR request of a group back to TO_DO (or DELAYED).
    #[tracing::instrument(skip(self))]
    pub fn retry(&mut self, group_id: &str) -> usize {
        let mut count = 0;
        for id in self
            .storage_requests
            .ids_where(|r| r.in_group(group_id) && r.status() == FileRequestStatus::Error)
        {
            count += usize::from(self.retry_storage_request(id));
        }
        for id in self
            .deletion_requests
            .ids_where(|r| r.in_group(group_id) && r.status() == FileRequestStatus::Error)
        {
            if let Some(request) = self.deletion_requests.get_mut(id) {
                request.header.reset(FileRequestStatus::ToDo);
                count += 1;
            }
        }
        for id in self
            .cache_requests
            .ids_where(|r| r.in_group(group_id) && r.status() == FileRequestStatus::Error)
        {
            if let Some(request) = self.cache_requests.get_mut(id) {
                request.header.reset(FileRequestStatus::ToDo);
                count += 1;
            }
        }
        for id in self
            .copy_requests
            .ids_where(|r| r.in_group(group_id) && r.status() == FileRequestStatus::Error)
        {
            if let Some(request) = self.copy_requests.get_mut(id) {
                request.header.reset(FileRequestStatus::ToDo);
                request.cache_group_id = None;
                request.storage_group_id = None;
                count += 1;
            }
        }
        tracing::info!(count, "Requests set back for retry");
        count
    }

    /// Check whether storage requests are queued or running on a storage.
    pub fn is_storage_running(&self, storage: &str) -> bool {
        self.storage_requests
            .iter()
            .any(|r| r.storage == storage && r.status().is_running())
    }

    /// Remove requests of every kind on a storage, optionally by status.
    #[tracing::instrument(skip(self))]
    pub fn delete_requests_by_storage(&mut self, storage: &str, status: Option<FileRequestStatus>) -> usize {
        fn matches<R: FileRequest>(request: &R, storage: &str, status: Option<FileRequestStatus>) -> bool {
            request.storage() == storage && status.is_none_or(|s| request.status() == s)
        }
        let removed = self.storage_requests.remove_where(|r| matches(r, storage, status)).len()
            + self.deletion_requests.remove_where(|r| matches(r, storage, status)).len()
            + self.copy_requests.remove_where(|r| matches(r, storage, status)).len()
            + self.cache_requests.remove_where(|r| matches(r, storage, status)).len();
        tracing::info!(removed, "Requests removed");
        removed
    }
}

/// `file://` URL of a local path.
pub(crate) fn file_url(path: &Path) -> String {
    url::Url::from_file_path(path)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}", path.display()))
}
