//! Deletion requests: removing owners and physically deleting files.

use super::Ledger;
use crate::reconcile::{ReferenceEvent, reconcile};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use stowage_core::{
    DeletionRequestItem, FileDeletionRequest, FileReferenceEvent, FileReferenceEventState,
    FileRequest, FileRequestStatus, FileRequestType, ReferenceKey, RequestHeader, RequestResultInfo,
};

impl Ledger {
    /// Submit a group of owner removals.
    ///
    /// The whole group is denied if any file is the source of a copy still
    /// TO_DO or PENDING. Returns whether the group was granted.
    #[tracing::instrument(skip(self, items), fields(count = items.len()))]
    pub fn delete(&mut self, items: Vec<DeletionRequestItem>, group_id: &str, now: DateTime<Utc>) -> bool {
        if let Some(item) = items.iter().find(|item| self.is_copy_running(&item.checksum)) {
            let cause = format!("File {} is being copied, deletion denied", item.checksum);
            let event = self.groups.deny(group_id, FileRequestType::Deletion, &cause);
            self.publish_group(event);
            return false;
        }

        self.grant(group_id, FileRequestType::Deletion, now);
        for item in items {
            self.remove_owner(
                &item.checksum,
                &item.storage,
                &item.owner,
                item.force_delete,
                Some(group_id),
            );
            self.add_result(
                RequestResultInfo::new(group_id, FileRequestType::Deletion, &item.checksum)
                    .with_storage(&item.storage)
                    .with_owners(BTreeSet::from([item.owner])),
            );
        }
        true
    }

    fn is_copy_running(&self, checksum: &str) -> bool {
        self.copy_requests
            .iter()
            .any(|c| c.meta_info.checksum == checksum && c.status().is_running())
    }

    /// Remove one owner from a file reference.
    ///
    /// Without `force`, the last owner leaving turns the reference into a
    /// zombie and queues its physical deletion. With `force`, the reference
    /// is purged from the catalog right away, whatever owners remain, and
    /// the bytes are left on the storage. A forced removal during a running
    /// deletion job marks that deletion forced instead; the job outcome then
    /// purges the reference and releases delayed storage requests.
    #[tracing::instrument(skip(self, group_id))]
    pub fn remove_owner(
        &mut self,
        checksum: &str,
        storage: &str,
        owner: &str,
        force: bool,
        group_id: Option<&str>,
    ) {
        let key = ReferenceKey::new(storage, checksum);
        self.withdraw_storage_owner(&key, owner);
        let deletion_running = self
            .deletion_requests
            .by_key(&key)
            .is_some_and(|d| d.status() == FileRequestStatus::Pending);
        let transition = reconcile(
            self.catalog.get(&key),
            ReferenceEvent::OwnerRemoved {
                owner,
                force,
                storage_known: self.registry.contains(storage),
                deletion_running,
            },
        );
        self.apply_transition(transition, group_id);
    }

    /// Create (or requeue) the deletion request of a zombie reference.
    pub(super) fn create_deletion_request(&mut self, key: &ReferenceKey, force: bool, group_id: Option<&str>) {
        let Some(reference) = self.catalog.get(key).cloned() else {
            return;
        };
        if let Some(existing) = self.deletion_requests.by_key_mut(key) {
            if let Some(group_id) = group_id {
                existing.header.group_ids.insert(group_id.to_string());
            }
            existing.force_delete |= force;
            if existing.status() == FileRequestStatus::Error {
                existing.header.reset(FileRequestStatus::ToDo);
            }
            tracing::debug!(%key, status = %existing.status(), "[DELETION REQUESTS] Deletion already requested");
            return;
        }

        let id = self.next_request_id();
        let mut header = RequestHeader::new(id, group_id.unwrap_or_default(), FileRequestStatus::ToDo);
        if group_id.is_none() {
            header.group_ids.clear();
        }
        self.deletion_requests.insert(FileDeletionRequest {
            header,
            meta_info: reference.meta_info,
            location: reference.location,
            force_delete: force,
        });
        tracing::info!(%key, request_id = %id, force, "[DELETION REQUESTS] New deletion request");
    }

    /// Delete every file of a storage, whatever its owners.
    ///
    /// Returns the number of files concerned.
    #[tracing::instrument(skip(self))]
    pub fn delete_all_from_storage(
        &mut self,
        storage: &str,
        force: bool,
        group_id: &str,
        now: DateTime<Utc>,
    ) -> usize {
        self.grant(group_id, FileRequestType::Deletion, now);
        let known = self.registry.contains(storage);
        let references: Vec<_> = self.catalog.by_storage(storage).into_iter().cloned().collect();
        for reference in &references {
            let key = reference.key();
            if let Some(file) = self.catalog.get_mut(&key) {
                file.owners.clear();
            }
            if known {
                self.create_deletion_request(&key, force, Some(group_id));
            } else {
                let transition = reconcile(
                    self.catalog.get(&key),
                    ReferenceEvent::OwnerRemoved {
                        owner: "",
                        force: false,
                        storage_known: false,
                        deletion_running: false,
                    },
                );
                self.apply_transition(transition, Some(group_id));
            }
            self.add_result(
                RequestResultInfo::new(group_id, FileRequestType::Deletion, &key.checksum)
                    .with_storage(storage)
                    .with_owners(reference.owners.clone()),
            );
        }
        tracing::info!(count = references.len(), "[DELETION REQUESTS] Storage emptied");
        references.len()
    }

    /// Move a deletion request to ERROR, reporting it.
    ///
    /// Storage requests delayed behind it are released: the bytes are still
    /// there, so the reference is kept and stored again for its new owners.
    pub(super) fn fail_deletion_request(&mut self, request: &FileDeletionRequest, cause: &str) {
        let key = ReferenceKey::new(&request.location.storage, &request.meta_info.checksum);
        tracing::warn!(%key, %cause, "[DELETION REQUESTS] Deletion failed");
        let delayed = self
            .storage_requests
            .by_key(&key)
            .is_some_and(|r| r.status() == FileRequestStatus::Delayed);
        if delayed {
            self.deletion_requests.remove(request.id());
            self.release_delayed(&key);
        } else if let Some(failed) = self.deletion_requests.get_mut(request.id()) {
            failed.header.fail(cause);
        }
        self.emit(
            FileReferenceEvent::new(
                &request.meta_info.checksum,
                FileReferenceEventState::DeletionError,
                format!("Error deleting file {}", request.meta_info.file_name),
            )
            .with_storage(&request.location.storage)
            .with_location(request.location.clone())
            .with_error(cause)
            .with_groups(request.header.group_ids.clone()),
        );
    }
}
