//! File reference type.

use crate::{FileLocation, FileReferenceMetaInfo, ReferenceKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A file stored once on a storage location and shared by its owners.
///
/// A reference whose owner set is empty is a zombie awaiting deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    /// Unique identifier
    pub id: Uuid,
    /// Content metadata
    pub meta_info: FileReferenceMetaInfo,
    /// Physical location
    pub location: FileLocation,
    /// Opaque owner identifiers
    pub owners: BTreeSet<String>,
    /// When the reference was created
    pub creation_date: DateTime<Utc>,
}

impl FileReference {
    /// Create a new reference with the given owners.
    pub fn new<I, S>(meta_info: FileReferenceMetaInfo, location: FileLocation, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            meta_info,
            location,
            owners: owners.into_iter().map(Into::into).collect(),
            creation_date: Utc::now(),
        }
    }

    /// Catalog key of this reference.
    pub fn key(&self) -> ReferenceKey {
        ReferenceKey::new(&self.location.storage, &self.meta_info.checksum)
    }

    /// Check whether the owner references this file.
    pub fn has_owner(&self, owner: &str) -> bool {
        self.owners.contains(owner)
    }

    /// No owner left: the reference awaits deletion.
    pub fn is_zombie(&self) -> bool {
        self.owners.is_empty()
    }
}
