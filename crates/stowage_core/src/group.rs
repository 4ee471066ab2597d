//! Request groups and per-file results.

use crate::{FileReference, FileRequestType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A batch submitted under one business id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGroup {
    /// Caller-supplied business id
    pub id: String,
    /// Kind of requests in the group
    pub request_type: FileRequestType,
    /// When the group was granted
    pub creation_date: DateTime<Utc>,
    /// After this date the group is abandoned for reporting
    pub expiration_date: Option<DateTime<Utc>>,
}

impl RequestGroup {
    /// Create a group granted now.
    pub fn new(
        id: impl Into<String>,
        request_type: FileRequestType,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            request_type,
            creation_date: Utc::now(),
            expiration_date,
        }
    }

    /// Check whether the group expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|expiration| expiration < now)
    }
}

/// What happened to one file of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResultInfo {
    /// Group the result belongs to
    pub group_id: String,
    /// Kind of request
    pub request_type: FileRequestType,
    /// Checksum of the file
    pub checksum: String,
    /// Storage location of the request
    pub storage: Option<String>,
    /// Requested sub-directory, if any
    pub request_path: Option<String>,
    /// Resulting file reference on success
    pub result_file: Option<FileReference>,
    /// Owners concerned
    pub owners: BTreeSet<String>,
    /// Whether the request failed
    pub error: bool,
    /// Failure cause
    pub error_cause: Option<String>,
}

impl RequestResultInfo {
    /// Create a successful result with no storage, path, file or owners.
    pub fn new(
        group_id: impl Into<String>,
        request_type: FileRequestType,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            request_type,
            checksum: checksum.into(),
            storage: None,
            request_path: None,
            result_file: None,
            owners: BTreeSet::new(),
            error: false,
            error_cause: None,
        }
    }

    /// Set the storage location.
    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    /// Set the requested sub-directory.
    pub fn with_request_path(mut self, request_path: Option<String>) -> Self {
        self.request_path = request_path;
        self
    }

    /// Set the resulting file reference.
    pub fn with_result_file(mut self, file: FileReference) -> Self {
        self.result_file = Some(file);
        self
    }

    /// Set the owners.
    pub fn with_owners(mut self, owners: BTreeSet<String>) -> Self {
        self.owners = owners;
        self
    }

    /// Mark the result as failed.
    pub fn with_error(mut self, cause: impl Into<String>) -> Self {
        self.error = true;
        self.error_cause = Some(cause.into());
        self
    }
}

/// Status of a group as reported to callers.
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
pub enum GroupStatus {
    /// Group accepted
    #[display("GRANTED")]
    Granted,
    /// Group refused as a whole
    #[display("DENIED")]
    Denied,
    /// Every file succeeded
    #[display("SUCCESS")]
    Success,
    /// At least one file failed
    #[display("ERROR")]
    Error,
    /// Group expired before every file reported
    #[display("EXPIRED")]
    Expired,
}
