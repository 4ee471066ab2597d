//! Copy requests: make available, then store on the destination.
//!
//! A copy runs as two chained groups. Scheduling it grants a cache group
//! making the source available; the AVAILABLE event of that group submits
//! storage requests under a storage group; the STORED event of that group
//! completes the copy.

use super::Ledger;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use stowage_core::{
    CopyRequestItem, FileCopyRequest, FileReferenceEvent, FileReferenceEventState, FileRequest,
    FileRequestStatus, FileRequestType, ReferenceKey, RequestHeader, RequestId, RequestResultInfo,
    StorageRequestItem,
};
use uuid::Uuid;

impl Ledger {
    /// Submit a group of copies to other storages.
    #[tracing::instrument(skip(self, items), fields(count = items.len()))]
    pub fn copy(&mut self, items: Vec<CopyRequestItem>, group_id: &str, now: DateTime<Utc>) {
        self.grant(group_id, FileRequestType::Copy, now);
        for item in items {
            self.add_copy_request(item, group_id);
        }
    }

    fn add_copy_request(&mut self, item: CopyRequestItem, group_id: &str) {
        let Some(source) = self.best_reference(&item.checksum) else {
            let cause = format!("File {} is not stored on any known storage", item.checksum);
            self.reject_copy_item(&item, group_id, &cause);
            return;
        };
        if !self.registry.contains(&item.storage) {
            let cause = format!("destination storage {} is unknown or disabled", item.storage);
            self.reject_copy_item(&item, group_id, &cause);
            return;
        }
        if let Some(existing) = self.catalog.find(&item.storage, &item.checksum).cloned() {
            tracing::debug!(checksum = %item.checksum, "[COPY REQUESTS] File already on destination");
            self.add_result(
                RequestResultInfo::new(group_id, FileRequestType::Copy, &item.checksum)
                    .with_storage(&item.storage)
                    .with_request_path(item.sub_directory)
                    .with_result_file(existing.clone()),
            );
            self.emit(
                FileReferenceEvent::new(
                    &item.checksum,
                    FileReferenceEventState::Copied,
                    format!("File {} already on {}", existing.meta_info.file_name, item.storage),
                )
                .with_storage(&item.storage)
                .with_location(existing.location)
                .with_groups(BTreeSet::from([group_id.to_string()])),
            );
            return;
        }

        let key = ReferenceKey::new(&item.storage, &item.checksum);
        if let Some(existing) = self.copy_requests.by_key_mut(&key) {
            existing.header.group_ids.insert(group_id.to_string());
            if existing.status() == FileRequestStatus::Error {
                existing.header.reset(FileRequestStatus::ToDo);
                existing.cache_group_id = None;
                existing.storage_group_id = None;
            }
            tracing::debug!(%key, "[COPY REQUESTS] Copy already requested");
            return;
        }

        let id = self.next_request_id();
        self.copy_requests.insert(FileCopyRequest {
            header: RequestHeader::new(id, group_id, FileRequestStatus::ToDo),
            meta_info: source.meta_info,
            storage: item.storage,
            sub_directory: item.sub_directory,
            cache_group_id: None,
            storage_group_id: None,
        });
        tracing::info!(%key, request_id = %id, "[COPY REQUESTS] New copy request");
    }

    fn reject_copy_item(&mut self, item: &CopyRequestItem, group_id: &str, cause: &str) {
        tracing::warn!(checksum = %item.checksum, %cause, "[COPY REQUESTS] Copy rejected");
        self.add_result(
            RequestResultInfo::new(group_id, FileRequestType::Copy, &item.checksum)
                .with_storage(&item.storage)
                .with_request_path(item.sub_directory.clone())
                .with_error(cause),
        );
        self.emit(
            FileReferenceEvent::new(&item.checksum, FileReferenceEventState::CopyError, cause)
                .with_storage(&item.storage)
                .with_error(cause)
                .with_groups(BTreeSet::from([group_id.to_string()])),
        );
    }

    /// Start copies with the given status by making their sources available.
    ///
    /// Returns the number of copies started.
    #[tracing::instrument(skip(self))]
    pub fn schedule_copy_requests(&mut self, status: FileRequestStatus, now: DateTime<Utc>) -> usize {
        if !matches!(status, FileRequestStatus::ToDo | FileRequestStatus::Error) {
            tracing::warn!("[COPY REQUESTS] Only TO_DO or ERROR copies can be scheduled");
            return 0;
        }
        let ids = self.copy_requests.ids_where(|r| r.status() == status);
        for id in &ids {
            let cache_group_id = format!("copy-cache-{}", Uuid::new_v4());
            let Some(copy) = self.copy_requests.get_mut(*id) else {
                continue;
            };
            copy.header.reset(FileRequestStatus::Pending);
            copy.cache_group_id = Some(cache_group_id.clone());
            copy.storage_group_id = None;
            let checksum = copy.meta_info.checksum.clone();
            tracing::debug!(request_id = %id, %cache_group_id, "[COPY REQUESTS] Making copy source available");
            self.make_available(&[checksum], None, &cache_group_id, now);
        }
        ids.len()
    }

    /// Drive pending copies from file events of their chained groups.
    pub(super) fn route_copy_event(&mut self, event: &FileReferenceEvent) {
        let in_groups = |group: &Option<String>| {
            group.as_ref().is_some_and(|g| event.group_ids.contains(g))
        };
        match event.state {
            FileReferenceEventState::Available | FileReferenceEventState::AvailabilityError => {
                let ids = self.copy_requests.ids_where(|c| {
                    c.meta_info.checksum == event.checksum
                        && c.storage_group_id.is_none()
                        && in_groups(&c.cache_group_id)
                });
                for id in ids {
                    if event.is_error() {
                        let cause = event.error_cause.clone().unwrap_or_else(|| event.message.clone());
                        self.fail_copy(id, &cause);
                    } else {
                        self.start_copy_storage(id, event);
                    }
                }
            }
            FileReferenceEventState::Stored | FileReferenceEventState::StoreError => {
                let ids = self.copy_requests.ids_where(|c| {
                    c.meta_info.checksum == event.checksum && in_groups(&c.storage_group_id)
                });
                for id in ids {
                    if event.is_error() {
                        let cause = event.error_cause.clone().unwrap_or_else(|| event.message.clone());
                        self.fail_copy(id, &cause);
                    } else {
                        self.complete_copy(id);
                    }
                }
            }
            _ => {}
        }
    }

    fn start_copy_storage(&mut self, id: RequestId, event: &FileReferenceEvent) {
        let Some(location) = event.location.clone() else {
            self.fail_copy(id, "source made available without location");
            return;
        };
        let owners = event
            .storage
            .as_ref()
            .and_then(|storage| self.catalog.find(storage, &event.checksum))
            .map(|source| source.owners.clone())
            .unwrap_or_default();
        if owners.is_empty() {
            self.fail_copy(id, "source file has no owner left");
            return;
        }

        let storage_group_id = format!("copy-store-{}", Uuid::new_v4());
        let Some(copy) = self.copy_requests.get_mut(id) else {
            return;
        };
        copy.storage_group_id = Some(storage_group_id.clone());
        let copy = copy.clone();
        tracing::debug!(request_id = %id, %storage_group_id, "[COPY REQUESTS] Storing copy on destination");

        self.grant(&storage_group_id, FileRequestType::Storage, Utc::now());
        for owner in owners {
            let mut item = StorageRequestItem::new(owner, copy.meta_info.clone(), &location.url, &copy.storage);
            item.sub_directory = copy.sub_directory.clone();
            self.add_file_reference(item, &storage_group_id);
        }
    }

    fn complete_copy(&mut self, id: RequestId) {
        let Some(copy) = self.copy_requests.remove(id) else {
            return;
        };
        self.release_copy_source(&copy);
        let checksum = &copy.meta_info.checksum;
        let copied = self.catalog.find(&copy.storage, checksum).cloned();
        for group_id in &copy.header.group_ids {
            let mut result = RequestResultInfo::new(group_id, FileRequestType::Copy, checksum)
                .with_storage(&copy.storage)
                .with_request_path(copy.sub_directory.clone());
            if let Some(copied) = &copied {
                result = result.with_result_file(copied.clone());
            }
            self.add_result(result);
        }
        tracing::info!(%checksum, storage = %copy.storage, "[COPY REQUESTS] File copied");
        let mut event = FileReferenceEvent::new(
            checksum,
            FileReferenceEventState::Copied,
            format!("File {} copied to {}", copy.meta_info.file_name, copy.storage),
        )
        .with_storage(&copy.storage)
        .with_groups(copy.header.group_ids.clone());
        if let Some(copied) = copied {
            event = event.with_location(copied.location);
        }
        self.emit(event);
    }

    /// Let the cache evict the copy source once no group needs it.
    fn release_copy_source(&mut self, copy: &FileCopyRequest) {
        let checksum = &copy.meta_info.checksum;
        if let Some(cache_group_id) = &copy.cache_group_id
            && self.cache.get(checksum).is_some()
            && !self.cache.release_group(checksum, cache_group_id)
        {
            self.evictions.push(checksum.clone());
        }
    }

    fn fail_copy(&mut self, id: RequestId, cause: &str) {
        let Some(copy) = self.copy_requests.get_mut(id) else {
            return;
        };
        copy.header.fail(cause);
        let copy = copy.clone();
        self.release_copy_source(&copy);
        tracing::warn!(checksum = %copy.meta_info.checksum, %cause, "[COPY REQUESTS] Copy failed");
        for group_id in &copy.header.group_ids {
            self.add_result(
                RequestResultInfo::new(group_id, FileRequestType::Copy, &copy.meta_info.checksum)
                    .with_storage(&copy.storage)
                    .with_request_path(copy.sub_directory.clone())
                    .with_error(cause),
            );
        }
        self.emit(
            FileReferenceEvent::new(
                &copy.meta_info.checksum,
                FileReferenceEventState::CopyError,
                format!("Error copying file {} to {}", copy.meta_info.file_name, copy.storage),
            )
            .with_storage(&copy.storage)
            .with_error(cause)
            .with_groups(copy.header.group_ids.clone()),
        );
    }
}
