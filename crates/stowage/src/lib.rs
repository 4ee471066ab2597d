//! Stowage - content-addressed file reference catalog
//!
//! Stowage keeps track of which owners reference which file bytes on which
//! storage location, and drives the asynchronous requests that store, delete,
//! copy and restore those bytes.
//!
//! # Features
//!
//! - **Deduplication**: a file already stored only gains an owner
//! - **Owner-counted deletion**: bytes go away with their last owner
//! - **Delayed resurrection**: files re-requested during deletion are stored again afterwards
//! - **Nearline support**: restoration into a bounded, time-limited cache
//! - **Request groups**: per-group GRANTED / SUCCESS / ERROR / EXPIRED reporting
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use stowage::{FileReferenceMetaInfo, StorageRequestItem, StorageService, StowageConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = StorageService::new(&StowageConfig::load()?)?;
//!
//!     let meta = FileReferenceMetaInfo::new("9f86d081", "MD5", "notes.txt", "text/plain");
//!     let item = StorageRequestItem::new("alice", meta, "file:///tmp/notes.txt", "online-1");
//!     service.store(vec![item], "upload-1").await;
//!
//!     let summary = service.tick(chrono::Utc::now()).await?;
//!     println!("{} jobs executed", summary.jobs);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `stowage_error` - Error types
//! - `stowage_core` - Data model (references, requests, groups, events, jobs)
//! - `stowage_storage` - Storage backends and their registry
//! - `stowage_cache` - Cache of files restored from nearline storages
//! - `stowage_catalog` - Catalog, request ledger and storage service
//!
//! This crate re-exports everything for convenience.

pub use stowage_cache::*;
pub use stowage_catalog::*;
pub use stowage_core::*;
pub use stowage_error::*;
pub use stowage_storage::*;

pub mod observability;

pub use observability::{ObservabilityConfig, init_observability, init_observability_with_config};
