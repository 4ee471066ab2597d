//! Read-only search surface over file references.

use crate::FileReference;
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Filters for file reference searches. Unset filters match everything.
///
/// # Examples
///
/// ```
/// use stowage_core::FileReferenceFilterBuilder;
///
/// let filter = FileReferenceFilterBuilder::default()
///     .file_name(Some("report".to_string()))
///     .build()
///     .unwrap();
/// assert!(filter.checksum.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, derive_builder::Builder)]
#[builder(
    default,
    build_fn(validate = "Self::validate", error = "stowage_error::BuilderError")
)]
pub struct FileReferenceFilter {
    /// Substring of the file name
    pub file_name: Option<String>,
    /// Exact checksum
    pub checksum: Option<String>,
    /// Storage locations to include
    pub storages: BTreeSet<String>,
    /// Type tags to include
    pub types: BTreeSet<String>,
    /// Created at or after
    pub from: Option<DateTime<Utc>>,
    /// Created at or before
    pub to: Option<DateTime<Utc>>,
}

impl FileReferenceFilterBuilder {
    fn validate(&self) -> Result<(), stowage_error::BuilderError> {
        if let (Some(Some(from)), Some(Some(to))) = (self.from, self.to)
            && from > to
        {
            return Err(stowage_error::BuilderError::invalid_field(
                "to",
                format!("{} is before {}", to, from),
            ));
        }
        Ok(())
    }
}

impl FileReferenceFilter {
    /// Check whether a reference matches every set filter.
    pub fn matches(&self, reference: &FileReference) -> bool {
        if let Some(name) = &self.file_name
            && !reference.meta_info.file_name.contains(name.as_str())
        {
            return false;
        }
        if let Some(checksum) = &self.checksum
            && &reference.meta_info.checksum != checksum
        {
            return false;
        }
        if !self.storages.is_empty() && !self.storages.contains(&reference.location.storage) {
            return false;
        }
        if !self.types.is_empty() {
            match &reference.meta_info.file_type {
                Some(file_type) if self.types.contains(file_type) => {}
                _ => return false,
            }
        }
        if let Some(from) = self.from
            && reference.creation_date < from
        {
            return false;
        }
        if let Some(to) = self.to
            && reference.creation_date > to
        {
            return false;
        }
        true
    }
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Page number, starting at 0
    pub page: usize,
    /// Page size
    pub size: usize,
}

impl PageRequest {
    /// Create a page request.
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    /// Index of the first element of the page.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, size: 100 }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct Page<T> {
    content: Vec<T>,
    request: PageRequest,
    total_elements: usize,
}

impl<T> Page<T> {
    /// Cut a page out of a complete, already ordered result list.
    pub fn from_all(all: Vec<T>, request: PageRequest) -> Self {
        let total_elements = all.len();
        let content = all
            .into_iter()
            .skip(request.offset())
            .take(request.size)
            .collect();
        Self {
            content,
            request,
            total_elements,
        }
    }

    /// Check whether another page follows.
    pub fn has_next(&self) -> bool {
        self.request.offset() + self.content.len() < self.total_elements
    }

    /// Consume the page, returning its content.
    pub fn into_content(self) -> Vec<T> {
        self.content
    }
}
