//! Items callers submit in batches.

use crate::FileReferenceMetaInfo;
use serde::{Deserialize, Serialize};

/// One file to reference for an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRequestItem {
    /// Owner referencing the file
    pub owner: String,
    /// Content metadata
    pub meta_info: FileReferenceMetaInfo,
    /// Where the bytes can be read from
    pub origin_url: String,
    /// Destination storage location
    pub storage: String,
    /// Optional destination sub-directory
    pub sub_directory: Option<String>,
    /// Session owner tag for reporting
    pub session_owner: Option<String>,
    /// Session tag for reporting
    pub session: Option<String>,
}

impl StorageRequestItem {
    /// Create an item with no sub-directory or session tags.
    pub fn new(
        owner: impl Into<String>,
        meta_info: FileReferenceMetaInfo,
        origin_url: impl Into<String>,
        storage: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            meta_info,
            origin_url: origin_url.into(),
            storage: storage.into(),
            sub_directory: None,
            session_owner: None,
            session: None,
        }
    }

    /// Set the destination sub-directory.
    pub fn with_sub_directory(mut self, sub_directory: impl Into<String>) -> Self {
        self.sub_directory = Some(sub_directory.into());
        self
    }

    /// Set the session tags.
    pub fn with_session(mut self, session_owner: impl Into<String>, session: impl Into<String>) -> Self {
        self.session_owner = Some(session_owner.into());
        self.session = Some(session.into());
        self
    }
}

/// One owner to remove from a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionRequestItem {
    /// Checksum of the file
    pub checksum: String,
    /// Storage location of the file
    pub storage: String,
    /// Owner to remove
    pub owner: String,
    /// Administrative override
    pub force_delete: bool,
    /// Session owner tag for reporting
    pub session_owner: Option<String>,
    /// Session tag for reporting
    pub session: Option<String>,
}

impl DeletionRequestItem {
    /// Create an item without force or session tags.
    pub fn new(
        checksum: impl Into<String>,
        storage: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            storage: storage.into(),
            owner: owner.into(),
            force_delete: false,
            session_owner: None,
            session: None,
        }
    }

    /// Set the force flag.
    pub fn forced(mut self, force_delete: bool) -> Self {
        self.force_delete = force_delete;
        self
    }
}

/// One file to copy to another storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyRequestItem {
    /// Checksum of the file
    pub checksum: String,
    /// Destination storage location
    pub storage: String,
    /// Optional destination sub-directory
    pub sub_directory: Option<String>,
}

impl CopyRequestItem {
    /// Create an item without sub-directory.
    pub fn new(checksum: impl Into<String>, storage: impl Into<String>) -> Self {
        Self {
            checksum: checksum.into(),
            storage: storage.into(),
            sub_directory: None,
        }
    }
}
