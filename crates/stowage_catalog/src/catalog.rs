//! File reference catalog.

use std::collections::BTreeMap;
use stowage_core::{FileReference, FileReferenceFilter, Page, PageRequest, ReferenceKey};

/// Authoritative map of `(storage, checksum)` to file reference.
#[derive(Debug, Default, Clone)]
pub struct FileCatalog {
    references: BTreeMap<ReferenceKey, FileReference>,
}

impl FileCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact key lookup.
    pub fn find(&self, storage: &str, checksum: &str) -> Option<&FileReference> {
        self.references.get(&ReferenceKey::new(storage, checksum))
    }

    /// Lookup by key.
    pub fn get(&self, key: &ReferenceKey) -> Option<&FileReference> {
        self.references.get(key)
    }

    /// Mutable lookup by key.
    pub fn get_mut(&mut self, key: &ReferenceKey) -> Option<&mut FileReference> {
        self.references.get_mut(key)
    }

    /// Insert or replace the reference at its key.
    pub fn upsert(&mut self, reference: FileReference) {
        self.references.insert(reference.key(), reference);
    }

    /// Remove the reference at `key`.
    pub fn remove(&mut self, key: &ReferenceKey) -> Option<FileReference> {
        self.references.remove(key)
    }

    /// Every reference of a checksum, one per storage.
    pub fn by_checksum(&self, checksum: &str) -> Vec<&FileReference> {
        self.references
            .values()
            .filter(|r| r.meta_info.checksum == checksum)
            .collect()
    }

    /// Every reference stored on a storage location.
    pub fn by_storage(&self, storage: &str) -> Vec<&FileReference> {
        self.references
            .values()
            .filter(|r| r.location.storage == storage)
            .collect()
    }

    /// Filtered, paged query ordered by key.
    pub fn search(&self, filter: &FileReferenceFilter, page: PageRequest) -> Page<FileReference> {
        let matching = self
            .references
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Page::from_all(matching, page)
    }

    /// Number of references.
    pub fn len(&self) -> usize {
        self.references.len()
    }

    /// Check if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}
