//! File metadata types.

use serde::{Deserialize, Serialize};

/// Whether a checksum can address a file.
///
/// Checksums name files and directories on disk, so only non-empty ASCII
/// alphanumeric values are accepted.
pub fn is_valid_checksum(checksum: &str) -> bool {
    !checksum.is_empty() && checksum.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Metadata describing the content of a referenced file.
///
/// Immutable once a [`FileReference`](crate::FileReference) exists, except
/// for `file_name` and `file_type` which follow the latest submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_setters::Setters)]
#[setters(prefix = "with_", strip_option, into)]
pub struct FileReferenceMetaInfo {
    /// Content hash used as addressing key
    pub checksum: String,
    /// Algorithm of the checksum (e.g., "MD5", "SHA-256")
    pub algorithm: String,
    /// Original file name
    pub file_name: String,
    /// Declared size in bytes
    pub file_size: Option<u64>,
    /// Media type (e.g., "application/pdf")
    pub mime_type: String,
    /// Optional free-form type tag
    pub file_type: Option<String>,
}

impl FileReferenceMetaInfo {
    /// Create metadata with no declared size or type tag.
    pub fn new(
        checksum: impl Into<String>,
        algorithm: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            checksum: checksum.into(),
            algorithm: algorithm.into(),
            file_name: file_name.into(),
            file_size: None,
            mime_type: mime_type.into(),
            file_type: None,
        }
    }

    /// Whether the checksum can address a file, see [`is_valid_checksum`].
    pub fn has_valid_checksum(&self) -> bool {
        is_valid_checksum(&self.checksum)
    }

    /// Checksum prefixed with its algorithm, e.g. `MD5:abc123`.
    pub fn tagged_checksum(&self) -> String {
        format!("{}:{}", self.algorithm, self.checksum)
    }

    /// Apply the mutable part of a re-submission (file name and type tag).
    pub fn merge_submission(&mut self, other: &FileReferenceMetaInfo) {
        self.file_name = other.file_name.clone();
        if other.file_type.is_some() {
            self.file_type = other.file_type.clone();
        }
    }
}
