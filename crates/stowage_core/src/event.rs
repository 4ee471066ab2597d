//! Events published on completion of file operations.

use crate::{FileLocation, FileRequestType, GroupStatus, RequestResultInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// State carried by a [`FileReferenceEvent`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileReferenceEventState {
    /// File referenced (stored or owner added)
    #[display("STORED")]
    Stored,
    /// One owner removed, others remain
    #[display("DELETED_FOR_OWNER")]
    DeletedForOwner,
    /// File reference removed
    #[display("FULLY_DELETED")]
    FullyDeleted,
    /// Storage failed
    #[display("STORE_ERROR")]
    StoreError,
    /// Deletion failed
    #[display("DELETION_ERROR")]
    DeletionError,
    /// File readable
    #[display("AVAILABLE")]
    Available,
    /// File cannot be made readable
    #[display("AVAILABILITY_ERROR")]
    AvailabilityError,
    /// File copied to another storage
    #[display("COPIED")]
    Copied,
    /// Copy failed
    #[display("COPY_ERROR")]
    CopyError,
}

/// Notification about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReferenceEvent {
    /// Checksum of the file
    pub checksum: String,
    /// What happened
    pub state: FileReferenceEventState,
    /// Storage location involved, if any
    pub storage: Option<String>,
    /// Where the file can be accessed, if any
    pub location: Option<FileLocation>,
    /// Owners concerned
    pub owners: BTreeSet<String>,
    /// Human readable message
    pub message: String,
    /// Failure cause
    pub error_cause: Option<String>,
    /// Groups the event reports for
    pub group_ids: BTreeSet<String>,
}

impl FileReferenceEvent {
    /// Create an event with no location, owners or groups.
    pub fn new(
        checksum: impl Into<String>,
        state: FileReferenceEventState,
        message: impl Into<String>,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            state,
            storage: None,
            location: None,
            owners: BTreeSet::new(),
            message: message.into(),
            error_cause: None,
            group_ids: BTreeSet::new(),
        }
    }

    /// Set the storage involved.
    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    /// Set the access location.
    pub fn with_location(mut self, location: FileLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the owners.
    pub fn with_owners(mut self, owners: BTreeSet<String>) -> Self {
        self.owners = owners;
        self
    }

    /// Set the failure cause.
    pub fn with_error(mut self, cause: impl Into<String>) -> Self {
        self.error_cause = Some(cause.into());
        self
    }

    /// Set the groups.
    pub fn with_groups(mut self, group_ids: BTreeSet<String>) -> Self {
        self.group_ids = group_ids;
        self
    }

    /// Check whether the event reports a failure.
    pub fn is_error(&self) -> bool {
        matches!(
            self.state,
            FileReferenceEventState::StoreError
                | FileReferenceEventState::DeletionError
                | FileReferenceEventState::AvailabilityError
                | FileReferenceEventState::CopyError
        )
    }
}

/// Notification about a request group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRequestsGroupEvent {
    /// Group id
    pub group_id: String,
    /// Kind of requests in the group
    pub request_type: FileRequestType,
    /// Group status
    pub status: GroupStatus,
    /// Successful results
    pub successes: Vec<RequestResultInfo>,
    /// Failed results
    pub errors: Vec<RequestResultInfo>,
    /// Optional message (e.g., deny cause)
    pub message: Option<String>,
}

impl FileRequestsGroupEvent {
    /// Create an event with no results.
    pub fn new(group_id: impl Into<String>, request_type: FileRequestType, status: GroupStatus) -> Self {
        Self {
            group_id: group_id.into(),
            request_type,
            status,
            successes: Vec::new(),
            errors: Vec::new(),
            message: None,
        }
    }
}

/// Anything published on the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
pub enum StowageEvent {
    /// File level event
    File(FileReferenceEvent),
    /// Group level event
    Group(FileRequestsGroupEvent),
}
