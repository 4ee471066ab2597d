//! Restoration cache error types.

/// Cache error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CacheErrorKind {
    /// Cache directory cannot be created or is not writable
    #[display("Invalid cache directory: {}", _0)]
    Directory(String),
    /// Reading or deleting a cached file failed
    #[display("Cache I/O error: {}", _0)]
    Io(String),
    /// Not enough free space left in the cache
    #[display("Cache is full: {}", _0)]
    Full(String),
    /// Checksum cannot name a cached file
    #[display("Invalid checksum: {}", _0)]
    InvalidChecksum(String),
}

/// Cache error with source location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Cache Error: {} at line {} in {}", kind, line, file)]
pub struct CacheError {
    /// The kind of error that occurred
    pub kind: CacheErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CacheError {
    /// Create a new CacheError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CacheErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
