//! Catalog and request ledger error types.

/// Catalog error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum CatalogErrorKind {
    /// No file reference exists for the checksum
    #[display("File not found: {}", _0)]
    FileNotFound(String),
    /// The file exists but cannot be served
    #[display("File unavailable: {}", _0)]
    FileUnavailable(String),
    /// No backend is registered for the storage id
    #[display("Unknown storage: {}", _0)]
    UnknownStorage(String),
    /// No live request group with this id
    #[display("Unknown request group: {}", _0)]
    UnknownGroup(String),
    /// No request with this id
    #[display("Request not found: {}", _0)]
    RequestNotFound(u64),
    /// The submitted request is malformed
    #[display("Invalid request: {}", _0)]
    InvalidRequest(String),
    /// Waiting for a cache restoration took too long
    #[display("Timed out waiting for file {} to become available", _0)]
    DownloadTimeout(String),
}

/// Catalog error with source location tracking.
///
/// # Examples
///
/// ```
/// use stowage_error::{CatalogError, CatalogErrorKind};
///
/// let err = CatalogError::new(CatalogErrorKind::UnknownStorage("tape-9".into()));
/// assert!(format!("{}", err).contains("Unknown storage"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Catalog Error: {} at line {} in {}", kind, line, file)]
pub struct CatalogError {
    /// The kind of error that occurred
    pub kind: CatalogErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl CatalogError {
    /// Create a new CatalogError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: CatalogErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
