//! Core data types for Stowage.
//!
//! This crate holds the plain data model shared by every other crate in the
//! workspace: file references keyed by `(storage, checksum)`, the four request
//! kinds and their status machine, request groups with their per-file results,
//! the events published on completion, job descriptors exchanged with an
//! executor and the search surface.
//!
//! # Examples
//!
//! ```
//! use stowage_core::{FileLocation, FileReference, FileReferenceMetaInfo};
//!
//! let meta = FileReferenceMetaInfo::new("abc123", "MD5", "report.pdf", "application/pdf");
//! let location = FileLocation::new("online-1", "file:///data/ab/abc123");
//! let reference = FileReference::new(meta, location, ["owner-a"]);
//!
//! assert_eq!(reference.key().storage, "online-1");
//! assert!(reference.has_owner("owner-a"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod event;
mod group;
mod items;
mod job;
mod location;
mod meta;
mod reference;
mod request;
mod search;
mod status;

pub use event::{FileReferenceEvent, FileReferenceEventState, FileRequestsGroupEvent, StowageEvent};
pub use group::{GroupStatus, RequestGroup, RequestResultInfo};
pub use items::{CopyRequestItem, DeletionRequestItem, StorageRequestItem};
pub use job::{ItemOutcome, ItemResult, Job, JobAction, JobId, JobItem, JobKind, JobReport};
pub use location::{FileLocation, ReferenceKey};
pub use meta::{FileReferenceMetaInfo, is_valid_checksum};
pub use reference::FileReference;
pub use request::{
    FileCacheRequest, FileCopyRequest, FileDeletionRequest, FileRequest, FileStorageRequest,
    RequestHeader, RequestId,
};
pub use search::{FileReferenceFilter, FileReferenceFilterBuilder, Page, PageRequest};
pub use status::{FileRequestStatus, FileRequestType};
