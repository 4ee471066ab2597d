//! Storage requests: referencing files for owners.

use super::Ledger;
use crate::table::LedgerRequest;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use stowage_core::{
    FileReference, FileReferenceEvent, FileReferenceEventState, FileRequest, FileRequestStatus,
    FileRequestType, FileStorageRequest, ReferenceKey, RequestHeader, RequestId, RequestResultInfo,
    StorageRequestItem,
};

/// What happened to one storage submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddReferenceOutcome {
    /// The file was already stored; the owner now references it
    Referenced(FileReference),
    /// A storage request holds the submission (new or merged)
    Requested(RequestId),
}

impl Ledger {
    /// Submit a group of files to store.
    ///
    /// Each item either references an already stored file right away or
    /// creates (or joins) the storage request for its `(storage, checksum)`.
    #[tracing::instrument(skip(self, items), fields(count = items.len()))]
    pub fn store(
        &mut self,
        items: Vec<StorageRequestItem>,
        group_id: &str,
        now: DateTime<Utc>,
    ) -> Vec<AddReferenceOutcome> {
        self.grant(group_id, FileRequestType::Storage, now);
        items
            .into_iter()
            .map(|item| self.add_file_reference(item, group_id))
            .collect()
    }

    /// Reference one file for one owner.
    #[tracing::instrument(skip(self, item), fields(checksum = %item.meta_info.checksum, storage = %item.storage, owner = %item.owner))]
    pub fn add_file_reference(&mut self, item: StorageRequestItem, group_id: &str) -> AddReferenceOutcome {
        if !item.meta_info.has_valid_checksum() {
            let cause = format!(
                "Invalid checksum {:?}: only ASCII letters and digits are allowed",
                item.meta_info.checksum
            );
            return self.reject_storage_item(item, group_id, cause);
        }
        let key = ReferenceKey::new(&item.storage, &item.meta_info.checksum);

        if let Some(reference) = self.catalog.get(&key).cloned() {
            let deletion = self
                .deletion_requests
                .by_key(&key)
                .map(|d| (d.id(), d.status()));
            return match deletion {
                Some((id, FileRequestStatus::Error)) => {
                    self.deletion_requests.remove(id);
                    tracing::info!("[STORAGE REQUESTS] Failed deletion cancelled, file referenced again");
                    self.add_owner_to_reference(reference, item, group_id)
                }
                Some(_) => {
                    tracing::info!("[STORAGE REQUESTS] File is being deleted, storage delayed");
                    self.upsert_storage_request(item, group_id, FileRequestStatus::Delayed)
                }
                None => self.add_owner_to_reference(reference, item, group_id),
            };
        }

        if !self.registry.contains(&item.storage) {
            let cause = format!("destination storage {} is unknown or disabled", item.storage);
            return self.reject_storage_item(item, group_id, cause);
        }
        if let Err(e) = url::Url::parse(&item.origin_url) {
            let cause = format!("Invalid URL {}: {}", item.origin_url, e);
            return self.reject_storage_item(item, group_id, cause);
        }
        self.upsert_storage_request(item, group_id, FileRequestStatus::ToDo)
    }

    fn add_owner_to_reference(
        &mut self,
        reference: FileReference,
        item: StorageRequestItem,
        group_id: &str,
    ) -> AddReferenceOutcome {
        let mut updated = reference;
        updated.owners.insert(item.owner.clone());
        updated.meta_info.merge_submission(&item.meta_info);
        self.catalog.upsert(updated.clone());
        tracing::debug!("[STORAGE REQUESTS] File already stored, owner added");

        let owners = BTreeSet::from([item.owner]);
        self.add_result(
            RequestResultInfo::new(group_id, FileRequestType::Storage, &updated.meta_info.checksum)
                .with_storage(&updated.location.storage)
                .with_request_path(item.sub_directory)
                .with_result_file(updated.clone())
                .with_owners(owners.clone()),
        );
        self.emit(
            FileReferenceEvent::new(
                &updated.meta_info.checksum,
                FileReferenceEventState::Stored,
                format!(
                    "File {} already stored on {}",
                    updated.meta_info.file_name, updated.location.storage
                ),
            )
            .with_storage(&updated.location.storage)
            .with_location(updated.location.clone())
            .with_owners(owners)
            .with_groups(BTreeSet::from([group_id.to_string()])),
        );
        AddReferenceOutcome::Referenced(updated)
    }

    /// Create the storage request for a key, or merge into the existing one.
    fn upsert_storage_request(
        &mut self,
        item: StorageRequestItem,
        group_id: &str,
        status: FileRequestStatus,
    ) -> AddReferenceOutcome {
        let key = ReferenceKey::new(&item.storage, &item.meta_info.checksum);
        if let Some(existing) = self.storage_requests.by_key_mut(&key) {
            existing.owners.insert(item.owner);
            existing.header.group_ids.insert(group_id.to_string());
            existing.meta_info.merge_submission(&item.meta_info);
            if item.sub_directory.is_some() {
                existing.sub_directory = item.sub_directory;
            }
            if item.session_owner.is_some() {
                existing.header.session_owner = item.session_owner;
                existing.header.session = item.session;
            }
            if existing.status() == FileRequestStatus::Error {
                existing.header.reset(status);
            }
            tracing::debug!(request_id = %existing.id(), status = %existing.status(), "[STORAGE REQUESTS] Submission merged into existing request");
            return AddReferenceOutcome::Requested(existing.id());
        }

        let id = self.next_request_id();
        let mut header = RequestHeader::new(id, group_id, status);
        header.session_owner = item.session_owner;
        header.session = item.session;
        self.storage_requests.insert(FileStorageRequest {
            header,
            owners: BTreeSet::from([item.owner]),
            meta_info: item.meta_info,
            origin_url: item.origin_url,
            storage: item.storage,
            sub_directory: item.sub_directory,
        });
        tracing::debug!(request_id = %id, %status, "[STORAGE REQUESTS] New storage request");
        AddReferenceOutcome::Requested(id)
    }

    /// Record a submission that cannot be scheduled, in ERROR.
    fn reject_storage_item(
        &mut self,
        item: StorageRequestItem,
        group_id: &str,
        cause: String,
    ) -> AddReferenceOutcome {
        let key = ReferenceKey::new(&item.storage, &item.meta_info.checksum);
        let queued = self.storage_requests.by_key(&key).is_some();
        let outcome = self.upsert_storage_request(item, group_id, FileRequestStatus::ToDo);
        if !queued && let AddReferenceOutcome::Requested(id) = &outcome {
            tracing::warn!(%cause, "[STORAGE REQUESTS] Storage request rejected");
            self.fail_storage_request(*id, &cause);
        }
        outcome
    }

    /// Move a storage request to ERROR, reporting it.
    pub(super) fn fail_storage_request(&mut self, id: RequestId, cause: &str) {
        let Some(request) = self.storage_requests.get_mut(id) else {
            return;
        };
        request.header.fail(cause);
        let request = request.clone();
        tracing::warn!(request_id = %id, %cause, "[STORAGE REQUESTS] Storage request failed");
        for group_id in &request.header.group_ids {
            self.add_result(
                RequestResultInfo::new(group_id, FileRequestType::Storage, &request.meta_info.checksum)
                    .with_storage(&request.storage)
                    .with_request_path(request.sub_directory.clone())
                    .with_owners(request.owners.clone())
                    .with_error(cause),
            );
        }
        self.emit(
            FileReferenceEvent::new(
                &request.meta_info.checksum,
                FileReferenceEventState::StoreError,
                format!("Error storing file {}", request.meta_info.file_name),
            )
            .with_storage(&request.storage)
            .with_owners(request.owners.clone())
            .with_error(cause)
            .with_groups(request.header.group_ids.clone()),
        );
    }

    /// Record success results for a completed storage request.
    pub(super) fn report_stored(&mut self, request: &FileStorageRequest, reference: Option<&FileReference>) {
        for group_id in &request.header.group_ids {
            let mut result =
                RequestResultInfo::new(group_id, FileRequestType::Storage, &request.meta_info.checksum)
                    .with_storage(&request.storage)
                    .with_request_path(request.sub_directory.clone())
                    .with_owners(request.owners.clone());
            if let Some(reference) = reference {
                result = result.with_result_file(reference.clone());
            }
            self.add_result(result);
        }
    }

    /// Move DELAYED storage requests of a key back to TO_DO.
    pub(super) fn release_delayed(&mut self, key: &ReferenceKey) {
        if let Some(request) = self.storage_requests.by_key_mut(key)
            && request.status() == FileRequestStatus::Delayed
        {
            request.header.reset(FileRequestStatus::ToDo);
            tracing::info!(%key, request_id = %request.id(), "[STORAGE REQUESTS] Delayed storage request released");
        }
    }

    /// Status a storage request of this key must take when (re)queued.
    fn queue_status(&self, key: &ReferenceKey) -> FileRequestStatus {
        match self.deletion_requests.by_key(key) {
            Some(deletion) if deletion.status().is_running() => FileRequestStatus::Delayed,
            _ => FileRequestStatus::ToDo,
        }
    }

    /// Requeue one ERROR storage request.
    pub(super) fn retry_storage_request(&mut self, id: RequestId) -> bool {
        let Some(key) = self.storage_requests.get(id).map(|r| r.ledger_key()) else {
            return false;
        };
        let status = self.queue_status(&key);
        match self.storage_requests.get_mut(id) {
            Some(request) if request.status() == FileRequestStatus::Error => {
                request.header.reset(status);
                true
            }
            _ => false,
        }
    }

    /// Requeue ERROR storage requests of the given owners.
    #[tracing::instrument(skip(self))]
    pub fn retry_by_owners(&mut self, owners: &[String]) -> usize {
        let ids = self.storage_requests.ids_where(|r| {
            r.status() == FileRequestStatus::Error && owners.iter().any(|o| r.owners.contains(o))
        });
        let mut count = 0;
        for id in ids {
            count += usize::from(self.retry_storage_request(id));
        }
        tracing::info!(count, "[STORAGE REQUESTS] Requests set back for retry");
        count
    }

    /// Withdraw an owner from a queued storage request of the key.
    ///
    /// Requests already running are left alone.
    pub(super) fn withdraw_storage_owner(&mut self, key: &ReferenceKey, owner: &str) {
        let Some(request) = self.storage_requests.by_key_mut(key) else {
            return;
        };
        if request.status() == FileRequestStatus::Pending || !request.owners.remove(owner) {
            return;
        }
        tracing::debug!(%key, owner, "[STORAGE REQUESTS] Owner withdrawn from storage request");
        if request.owners.is_empty() {
            let id = request.id();
            self.storage_requests.remove(id);
            tracing::info!(%key, "[STORAGE REQUESTS] Storage request dropped, no owner left");
        }
    }
}
