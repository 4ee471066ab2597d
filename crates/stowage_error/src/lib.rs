//! Error types for the Stowage workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All constructors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use stowage_error::{CatalogError, CatalogErrorKind, StowageResult};
//!
//! fn lookup(checksum: &str) -> StowageResult<()> {
//!     Err(CatalogError::new(CatalogErrorKind::FileNotFound(checksum.to_string())))?
//! }
//!
//! assert!(lookup("abc123").is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod cache;
mod catalog;
mod config;
mod error;
mod storage;

pub use builder::{BuilderError, BuilderErrorKind};
pub use cache::{CacheError, CacheErrorKind};
pub use catalog::{CatalogError, CatalogErrorKind};
pub use config::ConfigError;
pub use error::{StowageError, StowageErrorKind, StowageResult};
pub use storage::{StorageError, StorageErrorKind};
