//! Request status and request type enumerations.

use serde::{Deserialize, Serialize};

/// Status of a file request.
///
/// Successful requests are removed from the ledger, so there is no terminal
/// success state.
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
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileRequestStatus {
    /// Created, waiting to be scheduled
    #[display("TO_DO")]
    ToDo,
    /// Claimed by a running job
    #[display("PENDING")]
    Pending,
    /// Blocked behind an in-flight deletion of the same key
    #[display("DELAYED")]
    Delayed,
    /// Failed, waiting for an explicit retry
    #[display("ERROR")]
    Error,
}

impl FileRequestStatus {
    /// Statuses of requests that are queued or running.
    pub const RUNNING: [FileRequestStatus; 2] = [FileRequestStatus::ToDo, FileRequestStatus::Pending];

    /// Queued or running.
    pub fn is_running(&self) -> bool {
        Self::RUNNING.contains(self)
    }
}

/// Kind of file request.
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
    strum::EnumIter,
    derive_more::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileRequestType {
    /// Store new bytes on a storage location
    #[display("STORAGE")]
    Storage,
    /// Remove bytes from a storage location
    #[display("DELETION")]
    Deletion,
    /// Copy a file to another storage location
    #[display("COPY")]
    Copy,
    /// Restore a nearline file into the cache
    #[display("CACHE")]
    Cache,
}
