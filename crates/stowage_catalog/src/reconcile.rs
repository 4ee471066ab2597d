//! Pure state transitions of a file reference.
//!
//! [`reconcile`] takes the current reference for a key (if any) and what
//! happened to it, and returns the new reference state plus the side effects
//! the ledger must apply. Nothing here touches the ledger, so the DELAYED
//! release logic can be tested on its own.

use std::collections::BTreeSet;
use stowage_core::{
    FileDeletionRequest, FileLocation, FileReference, FileReferenceEvent, FileReferenceEventState,
    FileStorageRequest, ReferenceKey,
};

/// What happened to a file reference.
#[derive(Debug, Clone, Copy)]
pub enum ReferenceEvent<'a> {
    /// A storage request completed
    Stored {
        /// The completed request
        request: &'a FileStorageRequest,
        /// URL of the stored bytes
        url: &'a str,
        /// Real size of the stored bytes
        file_size: u64,
    },
    /// A deletion request completed (or failed while forced)
    Deleted {
        /// The completed request
        request: &'a FileDeletionRequest,
    },
    /// An owner asked to stop referencing the file
    OwnerRemoved {
        /// Owner removed
        owner: &'a str,
        /// Purge without backend deletion, whatever the remaining owners
        force: bool,
        /// Whether a backend is registered for the storage
        storage_known: bool,
        /// Whether a deletion job for the key is in flight
        deletion_running: bool,
    },
}

/// New state of the reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceChange {
    /// Nothing to change
    Unchanged,
    /// Insert or replace the reference
    Upsert(FileReference),
    /// Remove the reference
    Remove(ReferenceKey),
}

/// Effect the ledger applies after the reference change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Publish a file event
    Publish(FileReferenceEvent),
    /// Move DELAYED storage requests of the key to TO_DO
    ReleaseDelayed(ReferenceKey),
    /// Drop cache requests restoring from the key
    DropCacheRequests(ReferenceKey),
    /// Drop the deletion request of the key
    DropDeletionRequest(ReferenceKey),
    /// Create (or retry) the deletion request of the key
    RequestDeletion {
        /// Reference to delete
        key: ReferenceKey,
        /// Force flag of the deletion request
        force: bool,
    },
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// New state of the reference
    pub reference: ReferenceChange,
    /// Effects to apply, in order
    pub effects: Vec<SideEffect>,
}

impl Transition {
    fn unchanged() -> Self {
        Self {
            reference: ReferenceChange::Unchanged,
            effects: Vec::new(),
        }
    }
}

/// Compute the transition of a reference for an event.
pub fn reconcile(reference: Option<&FileReference>, event: ReferenceEvent<'_>) -> Transition {
    match event {
        ReferenceEvent::Stored {
            request,
            url,
            file_size,
        } => stored(reference, request, url, file_size),
        ReferenceEvent::Deleted { request } => deleted(reference, request),
        ReferenceEvent::OwnerRemoved {
            owner,
            force,
            storage_known,
            deletion_running,
        } => match reference {
            Some(reference) => {
                owner_removed(reference, owner, force, storage_known, deletion_running)
            }
            None => Transition::unchanged(),
        },
    }
}

fn stored(
    reference: Option<&FileReference>,
    request: &FileStorageRequest,
    url: &str,
    file_size: u64,
) -> Transition {
    let updated = match reference {
        Some(existing) => {
            let mut merged = existing.clone();
            merged.owners.extend(request.owners.iter().cloned());
            merged.meta_info.merge_submission(&request.meta_info);
            merged
        }
        None => {
            let mut meta_info = request.meta_info.clone();
            meta_info.file_size = Some(file_size);
            FileReference::new(
                meta_info,
                FileLocation::new(&request.storage, url),
                request.owners.iter().cloned(),
            )
        }
    };
    let event = FileReferenceEvent::new(
        &request.meta_info.checksum,
        FileReferenceEventState::Stored,
        format!("File {} stored on {}", request.meta_info.file_name, request.storage),
    )
    .with_storage(&request.storage)
    .with_location(updated.location.clone())
    .with_owners(request.owners.clone())
    .with_groups(request.header.group_ids.clone());
    Transition {
        reference: ReferenceChange::Upsert(updated),
        effects: vec![SideEffect::Publish(event)],
    }
}

fn fully_deleted(key: ReferenceKey, location: Option<FileLocation>, group_ids: BTreeSet<String>) -> Transition {
    let mut event = FileReferenceEvent::new(
        &key.checksum,
        FileReferenceEventState::FullyDeleted,
        format!("File {} deleted from {}", key.checksum, key.storage),
    )
    .with_storage(&key.storage)
    .with_groups(group_ids);
    if let Some(location) = location {
        event = event.with_location(location);
    }
    Transition {
        reference: ReferenceChange::Remove(key.clone()),
        effects: vec![
            SideEffect::DropCacheRequests(key.clone()),
            SideEffect::Publish(event),
            SideEffect::ReleaseDelayed(key),
        ],
    }
}

fn deleted(reference: Option<&FileReference>, request: &FileDeletionRequest) -> Transition {
    let key = ReferenceKey::new(&request.location.storage, &request.meta_info.checksum);
    let location = reference.map(|r| r.location.clone());
    fully_deleted(key, location, request.header.group_ids.clone())
}

fn owner_removed(
    reference: &FileReference,
    owner: &str,
    force: bool,
    storage_known: bool,
    deletion_running: bool,
) -> Transition {
    let key = reference.key();
    // The in-flight job still owns the bytes; its outcome purges the reference
    if force && deletion_running {
        let mut updated = reference.clone();
        updated.owners.clear();
        return Transition {
            reference: ReferenceChange::Upsert(updated),
            effects: vec![SideEffect::RequestDeletion { key, force: true }],
        };
    }
    if force {
        let mut transition = fully_deleted(key.clone(), Some(reference.location.clone()), BTreeSet::new());
        transition
            .effects
            .insert(0, SideEffect::DropDeletionRequest(key));
        return transition;
    }

    if !reference.has_owner(owner) && !reference.is_zombie() {
        return Transition::unchanged();
    }

    let mut updated = reference.clone();
    updated.owners.remove(owner);

    if !updated.is_zombie() {
        let event = FileReferenceEvent::new(
            &key.checksum,
            FileReferenceEventState::DeletedForOwner,
            format!("File {} no longer referenced by {}", key.checksum, owner),
        )
        .with_storage(&key.storage)
        .with_location(updated.location.clone())
        .with_owners(BTreeSet::from([owner.to_string()]));
        return Transition {
            reference: ReferenceChange::Upsert(updated),
            effects: vec![SideEffect::Publish(event)],
        };
    }

    if !storage_known {
        return fully_deleted(key, Some(updated.location), BTreeSet::new());
    }

    Transition {
        reference: ReferenceChange::Upsert(updated),
        effects: vec![SideEffect::RequestDeletion { key, force: false }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::{FileReferenceMetaInfo, FileRequestStatus, RequestHeader, RequestId};

    fn meta() -> FileReferenceMetaInfo {
        FileReferenceMetaInfo::new("abc123", "MD5", "a.txt", "text/plain")
    }

    fn reference(owners: &[&str]) -> FileReference {
        FileReference::new(
            meta(),
            FileLocation::new("online-1", "memory://online-1/abc123"),
            owners.iter().copied(),
        )
    }

    fn storage_request(owner: &str) -> FileStorageRequest {
        FileStorageRequest {
            header: RequestHeader::new(RequestId(1), "g1", FileRequestStatus::Pending),
            owners: BTreeSet::from([owner.to_string()]),
            meta_info: meta(),
            origin_url: "file:///tmp/a.txt".to_string(),
            storage: "online-1".to_string(),
            sub_directory: None,
        }
    }

    fn deletion_request() -> FileDeletionRequest {
        FileDeletionRequest {
            header: RequestHeader::new(RequestId(2), "g2", FileRequestStatus::Pending),
            meta_info: meta(),
            location: FileLocation::new("online-1", "memory://online-1/abc123"),
            force_delete: false,
        }
    }

    fn published_states(transition: &Transition) -> Vec<FileReferenceEventState> {
        transition
            .effects
            .iter()
            .filter_map(|e| match e {
                SideEffect::Publish(event) => Some(event.state),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_stored_creates_reference() {
        let request = storage_request("A");
        let transition = reconcile(
            None,
            ReferenceEvent::Stored {
                request: &request,
                url: "memory://online-1/abc123",
                file_size: 42,
            },
        );
        let ReferenceChange::Upsert(created) = &transition.reference else {
            panic!("expected upsert");
        };
        assert_eq!(created.owners, BTreeSet::from(["A".to_string()]));
        assert_eq!(created.meta_info.file_size, Some(42));
        assert_eq!(published_states(&transition), vec![FileReferenceEventState::Stored]);
    }

    #[test]
    fn test_stored_merges_owners() {
        let existing = reference(&["A"]);
        let request = storage_request("B");
        let transition = reconcile(
            Some(&existing),
            ReferenceEvent::Stored {
                request: &request,
                url: "ignored",
                file_size: 1,
            },
        );
        let ReferenceChange::Upsert(merged) = transition.reference else {
            panic!("expected upsert");
        };
        assert_eq!(merged.owners.len(), 2);
        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.location, existing.location);
    }

    #[test]
    fn test_deletion_releases_delayed_after_publish() {
        let zombie = reference(&[]);
        let request = deletion_request();
        let transition = reconcile(Some(&zombie), ReferenceEvent::Deleted { request: &request });

        assert_eq!(transition.reference, ReferenceChange::Remove(zombie.key()));
        assert_eq!(
            published_states(&transition),
            vec![FileReferenceEventState::FullyDeleted]
        );
        assert_eq!(
            transition.effects.last(),
            Some(&SideEffect::ReleaseDelayed(zombie.key()))
        );
    }

    #[test]
    fn test_owner_removed_with_remaining_owners() {
        let file = reference(&["A", "B"]);
        let transition = reconcile(
            Some(&file),
            ReferenceEvent::OwnerRemoved {
                owner: "A",
                force: false,
                storage_known: true,
                deletion_running: false,
            },
        );
        let ReferenceChange::Upsert(updated) = &transition.reference else {
            panic!("expected upsert");
        };
        assert_eq!(updated.owners, BTreeSet::from(["B".to_string()]));
        assert_eq!(
            published_states(&transition),
            vec![FileReferenceEventState::DeletedForOwner]
        );
    }

    #[test]
    fn test_last_owner_requests_deletion() {
        let file = reference(&["A"]);
        let transition = reconcile(
            Some(&file),
            ReferenceEvent::OwnerRemoved {
                owner: "A",
                force: false,
                storage_known: true,
                deletion_running: false,
            },
        );
        assert!(matches!(&transition.reference, ReferenceChange::Upsert(r) if r.is_zombie()));
        assert_eq!(
            transition.effects,
            vec![SideEffect::RequestDeletion {
                key: file.key(),
                force: false
            }]
        );
    }

    #[test]
    fn test_last_owner_on_unknown_storage_removes_directly() {
        let file = reference(&["A"]);
        let transition = reconcile(
            Some(&file),
            ReferenceEvent::OwnerRemoved {
                owner: "A",
                force: false,
                storage_known: false,
                deletion_running: false,
            },
        );
        assert_eq!(transition.reference, ReferenceChange::Remove(file.key()));
    }

    #[test]
    fn test_force_purges_despite_owners() {
        let file = reference(&["A", "B"]);
        let transition = reconcile(
            Some(&file),
            ReferenceEvent::OwnerRemoved {
                owner: "A",
                force: true,
                storage_known: true,
                deletion_running: false,
            },
        );
        assert_eq!(transition.reference, ReferenceChange::Remove(file.key()));
        assert_eq!(
            transition.effects.first(),
            Some(&SideEffect::DropDeletionRequest(file.key()))
        );
        assert!(transition
            .effects
            .contains(&SideEffect::ReleaseDelayed(file.key())));
    }

    #[test]
    fn test_force_waits_for_running_deletion() {
        let file = reference(&[]);
        let transition = reconcile(
            Some(&file),
            ReferenceEvent::OwnerRemoved {
                owner: "A",
                force: true,
                storage_known: true,
                deletion_running: true,
            },
        );
        assert!(matches!(&transition.reference, ReferenceChange::Upsert(r) if r.is_zombie()));
        assert_eq!(
            transition.effects,
            vec![SideEffect::RequestDeletion {
                key: file.key(),
                force: true
            }]
        );
    }

    #[test]
    fn test_unknown_owner_is_noop() {
        let file = reference(&["A"]);
        let transition = reconcile(
            Some(&file),
            ReferenceEvent::OwnerRemoved {
                owner: "Z",
                force: false,
                storage_known: true,
                deletion_running: false,
            },
        );
        assert_eq!(transition.reference, ReferenceChange::Unchanged);
        assert!(transition.effects.is_empty());
    }
}
