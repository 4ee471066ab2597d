//! Job descriptors exchanged between the ledger and an executor.
//!
//! Scheduling produces a [`Job`]; the executor moves the bytes and answers
//! with a [`JobReport`] holding one [`ItemOutcome`] per request.

use crate::{FileLocation, FileReferenceMetaInfo, RequestId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Job identifier.
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
pub struct JobId(pub u64);

/// Kind of byte movement a job performs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum JobKind {
    /// Store files on a storage location
    #[display("storage")]
    Storage,
    /// Delete files from a storage location
    #[display("deletion")]
    Deletion,
    /// Restore files from a nearline location into the cache
    #[display("cache")]
    Cache,
}

/// What to do for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobAction {
    /// Copy bytes from the origin URL to the storage
    Store {
        /// Where the bytes are read from
        origin_url: String,
        /// Optional destination sub-directory
        sub_directory: Option<String>,
    },
    /// Delete bytes at the location
    Delete {
        /// Location to delete
        location: FileLocation,
    },
    /// Restore bytes at the location into a cache directory
    Restore {
        /// Location to restore from
        location: FileLocation,
        /// Directory to restore into
        restoration_directory: PathBuf,
    },
}

/// One request batched in a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    /// Request handled by this item
    pub request_id: RequestId,
    /// Metadata of the file
    pub meta_info: FileReferenceMetaInfo,
    /// Action to perform
    pub action: JobAction,
}

/// A batch of requests for one storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier
    pub id: JobId,
    /// Kind of job
    pub kind: JobKind,
    /// Storage location processed
    pub storage: String,
    /// Requests to process
    pub items: Vec<JobItem>,
}

/// Result of one job item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemResult {
    /// Bytes stored
    Stored {
        /// Backend URL of the stored file
        url: String,
        /// Real size in bytes
        file_size: u64,
    },
    /// Bytes deleted
    Deleted,
    /// Bytes restored into the cache
    Restored {
        /// Path of the restored file
        path: PathBuf,
        /// Real size in bytes
        file_size: u64,
    },
    /// Backend failure
    Failed {
        /// Failure cause
        cause: String,
    },
}

/// Outcome for one request of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Request concerned
    pub request_id: RequestId,
    /// What happened
    pub result: ItemResult,
}

impl ItemOutcome {
    /// Create a failure outcome.
    pub fn failed(request_id: RequestId, cause: impl Into<String>) -> Self {
        Self {
            request_id,
            result: ItemResult::Failed {
                cause: cause.into(),
            },
        }
    }
}

/// Per-request outcomes of a finished job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    /// Job identifier
    pub job_id: JobId,
    /// Kind of job
    pub kind: JobKind,
    /// Storage location processed
    pub storage: String,
    /// One outcome per job item
    pub outcomes: Vec<ItemOutcome>,
}
