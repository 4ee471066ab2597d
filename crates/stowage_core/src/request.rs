//! The four file request kinds and their common header.

use crate::{FileLocation, FileReferenceMetaInfo, FileRequestStatus, FileRequestType, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Request identifier, monotonically increasing inside a ledger.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct RequestId(pub u64);

/// State shared by every request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    /// Request identifier
    pub id: RequestId,
    /// Business correlation ids (several when merged across batches)
    pub group_ids: BTreeSet<String>,
    /// Current status
    pub status: FileRequestStatus,
    /// Creation timestamp
    pub creation_date: DateTime<Utc>,
    /// Job that claimed the request, if any
    pub job_id: Option<JobId>,
    /// Cause of the last failure
    pub error_cause: Option<String>,
    /// Session owner tag for reporting
    pub session_owner: Option<String>,
    /// Session tag for reporting
    pub session: Option<String>,
}

impl RequestHeader {
    /// Create a header for a new request in the given group.
    pub fn new(id: RequestId, group_id: impl Into<String>, status: FileRequestStatus) -> Self {
        Self {
            id,
            group_ids: BTreeSet::from([group_id.into()]),
            status,
            creation_date: Utc::now(),
            job_id: None,
            error_cause: None,
            session_owner: None,
            session: None,
        }
    }

    /// Move to ERROR with the given cause, releasing any job.
    pub fn fail(&mut self, cause: impl Into<String>) {
        self.status = FileRequestStatus::Error;
        self.error_cause = Some(cause.into());
        self.job_id = None;
    }

    /// Reset to the given status, clearing job and error cause.
    pub fn reset(&mut self, status: FileRequestStatus) {
        self.status = status;
        self.error_cause = None;
        self.job_id = None;
    }

    /// Claim the request for a job, dropping the cause of a previous failure.
    pub fn claim(&mut self, job_id: JobId) {
        self.status = FileRequestStatus::Pending;
        self.job_id = Some(job_id);
        self.error_cause = None;
    }
}

/// Behavior shared by all request kinds, used by generic ledger operations.
pub trait FileRequest {
    /// Kind of the request.
    const TYPE: FileRequestType;

    /// Common header.
    fn header(&self) -> &RequestHeader;

    /// Mutable common header.
    fn header_mut(&mut self) -> &mut RequestHeader;

    /// Storage location the request is processed on.
    fn storage(&self) -> &str;

    /// Checksum of the file concerned.
    fn checksum(&self) -> &str;

    /// Owners concerned by the request (empty when not applicable).
    fn owners(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    /// Request identifier.
    fn id(&self) -> RequestId {
        self.header().id
    }

    /// Current status.
    fn status(&self) -> FileRequestStatus {
        self.header().status
    }

    /// Check whether the request belongs to the group.
    fn in_group(&self, group_id: &str) -> bool {
        self.header().group_ids.contains(group_id)
    }
}

/// Request to store new bytes for one or more owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStorageRequest {
    /// Common header
    pub header: RequestHeader,
    /// Owners to reference once stored (never empty)
    pub owners: BTreeSet<String>,
    /// Content metadata
    pub meta_info: FileReferenceMetaInfo,
    /// Where the bytes are read from
    pub origin_url: String,
    /// Destination storage location
    pub storage: String,
    /// Optional destination sub-directory
    pub sub_directory: Option<String>,
}

impl FileRequest for FileStorageRequest {
    const TYPE: FileRequestType = FileRequestType::Storage;

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    fn storage(&self) -> &str {
        &self.storage
    }

    fn checksum(&self) -> &str {
        &self.meta_info.checksum
    }

    fn owners(&self) -> BTreeSet<String> {
        self.owners.clone()
    }
}

/// Request to delete the bytes of an ownerless file reference.
///
/// At most one exists per file reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDeletionRequest {
    /// Common header
    pub header: RequestHeader,
    /// Metadata of the file reference to delete
    pub meta_info: FileReferenceMetaInfo,
    /// Location of the file reference to delete
    pub location: FileLocation,
    /// Remove the reference even if the backend deletion fails
    pub force_delete: bool,
}

impl FileRequest for FileDeletionRequest {
    const TYPE: FileRequestType = FileRequestType::Deletion;

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    fn storage(&self) -> &str {
        &self.location.storage
    }

    fn checksum(&self) -> &str {
        &self.meta_info.checksum
    }
}

/// Request to copy a file to another storage location.
///
/// Decomposes into a cache restoration (tracked by `cache_group_id`) and a
/// storage request (tracked by `storage_group_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCopyRequest {
    /// Common header
    pub header: RequestHeader,
    /// Metadata of the file to copy
    pub meta_info: FileReferenceMetaInfo,
    /// Destination storage location
    pub storage: String,
    /// Optional destination sub-directory
    pub sub_directory: Option<String>,
    /// Group id of the cache step
    pub cache_group_id: Option<String>,
    /// Group id of the storage step
    pub storage_group_id: Option<String>,
}

impl FileRequest for FileCopyRequest {
    const TYPE: FileRequestType = FileRequestType::Copy;

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    fn storage(&self) -> &str {
        &self.storage
    }

    fn checksum(&self) -> &str {
        &self.meta_info.checksum
    }
}

/// Request to restore a nearline file into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCacheRequest {
    /// Common header
    pub header: RequestHeader,
    /// Metadata of the file to restore
    pub meta_info: FileReferenceMetaInfo,
    /// Location the file is restored from
    pub location: FileLocation,
    /// Cache directory the file is restored into
    pub restoration_directory: PathBuf,
    /// When the cached copy may be evicted
    pub expiration_date: DateTime<Utc>,
}

impl FileCacheRequest {
    /// Size used for cache capacity planning.
    pub fn file_size(&self) -> u64 {
        self.meta_info.file_size.unwrap_or(0)
    }
}

impl FileRequest for FileCacheRequest {
    const TYPE: FileRequestType = FileRequestType::Cache;

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }

    fn storage(&self) -> &str {
        &self.location.storage
    }

    fn checksum(&self) -> &str {
        &self.meta_info.checksum
    }
}
