//! Cache requests: making nearline files available.

use super::{Ledger, file_url};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use stowage_core::{
    FileCacheRequest, FileLocation, FileReference, FileReferenceEvent, FileReferenceEventState,
    FileRequest, FileRequestStatus, FileRequestType, RequestHeader, RequestId, RequestResultInfo,
};
use stowage_storage::StorageType;

/// Upper bound of the default cache expiration (100 years).
const MAX_EXPIRATION_HOURS: u64 = 24 * 365 * 100;

impl Ledger {
    /// Make files available for download.
    ///
    /// Files on an online storage, or already cached, are reported AVAILABLE
    /// at once. Others get a cache request. Returns the number of cache
    /// requests created.
    #[tracing::instrument(skip(self, checksums), fields(count = checksums.len()))]
    pub fn make_available(
        &mut self,
        checksums: &[String],
        expiration: Option<DateTime<Utc>>,
        group_id: &str,
        now: DateTime<Utc>,
    ) -> usize {
        self.grant(group_id, FileRequestType::Cache, now);
        let expiration = expiration.unwrap_or_else(|| {
            let hours = (*self.cache.config().default_expiration_hours()).min(MAX_EXPIRATION_HOURS);
            now + Duration::hours(hours as i64)
        });
        let mut created = 0;
        for checksum in checksums {
            if self.make_file_available(checksum, expiration, group_id, now) {
                created += 1;
            }
        }
        created
    }

    /// Best reference to serve a checksum from: online first, then by priority.
    pub fn best_reference(&self, checksum: &str) -> Option<FileReference> {
        self.catalog
            .by_checksum(checksum)
            .into_iter()
            .filter_map(|r| {
                let storage_type = self.registry.storage_type(&r.location.storage)?;
                let priority = self.registry.priority(&r.location.storage).unwrap_or(u32::MAX);
                Some(((storage_type != StorageType::Online, priority), r))
            })
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, r)| r.clone())
    }

    fn make_file_available(
        &mut self,
        checksum: &str,
        expiration: DateTime<Utc>,
        group_id: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(reference) = self.best_reference(checksum) else {
            let cause = format!("File {} is not stored on any known storage", checksum);
            self.report_unavailable(checksum, group_id, &cause);
            return false;
        };
        let storage = reference.location.storage.clone();

        let location = match self.registry.storage_type(&storage) {
            Some(StorageType::Online) => reference.location.clone(),
            _ if self.cache.is_cached(checksum, now) => {
                let path = match self.cache.file_path(checksum) {
                    Ok(path) => path,
                    Err(e) => {
                        self.report_unavailable(checksum, group_id, &e.to_string());
                        return false;
                    }
                };
                self.cache.touch(checksum, expiration, Some(group_id));
                FileLocation::new(&storage, file_url(&path))
            }
            _ => return self.create_cache_request(&reference, expiration, group_id),
        };

        self.add_result(
            RequestResultInfo::new(group_id, FileRequestType::Cache, checksum)
                .with_storage(&storage)
                .with_result_file(reference.clone()),
        );
        self.emit(
            FileReferenceEvent::new(
                checksum,
                FileReferenceEventState::Available,
                format!("File {} is available", reference.meta_info.file_name),
            )
            .with_storage(&storage)
            .with_location(location)
            .with_owners(reference.owners.clone())
            .with_groups(BTreeSet::from([group_id.to_string()])),
        );
        false
    }

    /// Create the cache request of a nearline file, or join the existing one.
    fn create_cache_request(
        &mut self,
        reference: &FileReference,
        expiration: DateTime<Utc>,
        group_id: &str,
    ) -> bool {
        let checksum = reference.meta_info.checksum.clone();
        if let Some(existing) = self.cache_requests.by_key_mut(&checksum) {
            existing.header.group_ids.insert(group_id.to_string());
            if expiration > existing.expiration_date {
                existing.expiration_date = expiration;
            }
            if existing.status() == FileRequestStatus::Error {
                existing.header.reset(FileRequestStatus::ToDo);
            }
            tracing::debug!(%checksum, status = %existing.status(), "[CACHE REQUESTS] Restoration already requested");
            return false;
        }

        let restoration_directory = match self.cache.restoration_directory(&checksum) {
            Ok(directory) => directory,
            Err(e) => {
                self.report_unavailable(&checksum, group_id, &e.to_string());
                return false;
            }
        };
        let id = self.next_request_id();
        self.cache_requests.insert(FileCacheRequest {
            header: RequestHeader::new(id, group_id, FileRequestStatus::ToDo),
            meta_info: reference.meta_info.clone(),
            location: reference.location.clone(),
            restoration_directory,
            expiration_date: expiration,
        });
        tracing::info!(%checksum, request_id = %id, storage = %reference.location.storage, "[CACHE REQUESTS] New cache request");
        true
    }

    /// Register a restored file and report it AVAILABLE.
    pub(super) fn complete_cache_request(&mut self, id: RequestId, file_size: u64) {
        let path = match self
            .cache_requests
            .get(id)
            .map(|r| self.cache.file_path(&r.meta_info.checksum))
        {
            Some(Ok(path)) => path,
            Some(Err(e)) => {
                self.fail_cache_request(id, &e.to_string());
                return;
            }
            None => return,
        };
        let Some(request) = self.cache_requests.remove(id) else {
            return;
        };
        let checksum = &request.meta_info.checksum;
        let storage = &request.location.storage;
        let groups: Vec<Option<&str>> = if request.header.group_ids.is_empty() {
            vec![None]
        } else {
            request.header.group_ids.iter().map(|g| Some(g.as_str())).collect()
        };
        for group_id in groups {
            if let Err(e) = self
                .cache
                .register(checksum, file_size, storage, request.expiration_date, group_id)
            {
                tracing::warn!(%checksum, error = %e, "[CACHE REQUESTS] Restored file not indexed");
            }
            if let Some(group_id) = group_id {
                self.add_result(
                    RequestResultInfo::new(group_id, FileRequestType::Cache, checksum).with_storage(storage),
                );
            }
        }
        let location = FileLocation::new(storage, file_url(&path));
        tracing::info!(%checksum, file_size, "[CACHE REQUESTS] File restored in cache");
        self.emit(
            FileReferenceEvent::new(
                checksum,
                FileReferenceEventState::Available,
                format!("File {} restored in cache", request.meta_info.file_name),
            )
            .with_storage(storage)
            .with_location(location)
            .with_groups(request.header.group_ids.clone()),
        );
    }

    /// Report a file that cannot be made available to a group.
    fn report_unavailable(&mut self, checksum: &str, group_id: &str, cause: &str) {
        self.add_result(
            RequestResultInfo::new(group_id, FileRequestType::Cache, checksum).with_error(cause),
        );
        self.emit(
            FileReferenceEvent::new(checksum, FileReferenceEventState::AvailabilityError, cause)
                .with_error(cause)
                .with_groups(BTreeSet::from([group_id.to_string()])),
        );
    }

    /// Move a cache request to ERROR, reporting it.
    pub(super) fn fail_cache_request(&mut self, id: RequestId, cause: &str) {
        let Some(request) = self.cache_requests.get_mut(id) else {
            return;
        };
        request.header.fail(cause);
        let request = request.clone();
        tracing::warn!(checksum = %request.meta_info.checksum, %cause, "[CACHE REQUESTS] Restoration failed");
        for group_id in &request.header.group_ids {
            self.add_result(
                RequestResultInfo::new(group_id, FileRequestType::Cache, &request.meta_info.checksum)
                    .with_storage(&request.location.storage)
                    .with_error(cause),
            );
        }
        self.emit(
            FileReferenceEvent::new(
                &request.meta_info.checksum,
                FileReferenceEventState::AvailabilityError,
                format!("Error restoring file {}", request.meta_info.file_name),
            )
            .with_storage(&request.location.storage)
            .with_location(request.location.clone())
            .with_error(cause)
            .with_groups(request.header.group_ids.clone()),
        );
    }
}
