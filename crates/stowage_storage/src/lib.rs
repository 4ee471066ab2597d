//! Pluggable storage backends for Stowage.
//!
//! A storage location is a named backend that moves bytes: it stores a file
//! read from an origin URL, deletes it, and restores it into a local
//! directory. Each backend declares whether stored content is immediately
//! readable ([`StorageType::Online`]) or needs a restore step first
//! ([`StorageType::Nearline`]).
//!
//! # Features
//!
//! - **Content addressing**: files are laid out by checksum
//! - **Checksum verification**: SHA-256 checksums are verified on store
//! - **Atomic writes**: temp file + rename
//! - **Priorities**: the [`StorageRegistry`] orders locations for reads
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stowage_storage::{MemoryStorage, StorageRegistry, StorageType};
//!
//! let mut registry = StorageRegistry::new();
//! registry.register("online-1", Arc::new(MemoryStorage::new("online-1", StorageType::Online)), 0);
//!
//! assert!(registry.contains("online-1"));
//! assert_eq!(registry.storage_type("online-1"), Some(StorageType::Online));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod filesystem;
mod memory;
mod origin;
mod registry;

pub use backend::{StorageBackend, StorageType, StoredFile};
pub use config::{StorageKind, StorageLocationConfig};
pub use filesystem::FileSystemStorage;
pub use memory::MemoryStorage;
pub use origin::verify_checksum;
pub use registry::StorageRegistry;
pub use stowage_error::{StorageError, StorageErrorKind};
