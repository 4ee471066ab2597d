//! Storage locations and catalog keys.

use serde::{Deserialize, Serialize};

/// Where a file physically lives: a storage id plus a backend-specific URL.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("{}:{}", storage, url)]
pub struct FileLocation {
    /// Storage location identifier
    pub storage: String,
    /// Backend-specific URL of the file
    pub url: String,
}

impl FileLocation {
    /// Create a new location.
    pub fn new(storage: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            storage: storage.into(),
            url: url.into(),
        }
    }
}

/// Unique identity of a file reference in the catalog.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[display("({}, {})", storage, checksum)]
pub struct ReferenceKey {
    /// Storage location identifier
    pub storage: String,
    /// Content checksum
    pub checksum: String,
}

impl ReferenceKey {
    /// Create a new key.
    pub fn new(storage: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            storage: storage.into(),
            checksum: checksum.into(),
        }
    }
}
