//! Restoration cache for nearline files.
//!
//! Nearline storages cannot serve bytes directly: files are first restored
//! into a local cache directory where they stay until their expiration date.
//! This crate keeps the index of cached files and the on-disk layout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;

pub use cache::{CacheFile, FileCache};
pub use config::{FileCacheConfig, FileCacheConfigBuilder};
