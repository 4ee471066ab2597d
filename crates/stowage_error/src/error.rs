//! Top-level error wrapper types.

use crate::{BuilderError, CacheError, CatalogError, ConfigError, StorageError};

/// Every failure a Stowage component can raise.
///
/// # Examples
///
/// ```
/// use stowage_error::{StowageError, ConfigError};
///
/// let err: StowageError = ConfigError::new("missing [cache] section").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum StowageErrorKind {
    /// Storage backend error
    #[from(StorageError)]
    Storage(StorageError),
    /// Catalog or request ledger error
    #[from(CatalogError)]
    Catalog(CatalogError),
    /// Restoration cache error
    #[from(CacheError)]
    Cache(CacheError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
}

/// Stowage error with kind discrimination.
///
/// # Examples
///
/// ```
/// use stowage_error::{StowageErrorKind, StowageResult, StorageError, StorageErrorKind};
///
/// fn might_fail() -> StowageResult<()> {
///     Err(StorageError::new(StorageErrorKind::Unavailable("tape-1".into())))?
/// }
///
/// let err = might_fail().unwrap_err();
/// assert!(matches!(err.kind(), StowageErrorKind::Storage(_)));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Stowage Error: {}", _0)]
pub struct StowageError(Box<StowageErrorKind>);

impl StowageError {
    /// Create a new error from a kind.
    pub fn new(kind: StowageErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &StowageErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to StowageErrorKind
impl<T> From<T> for StowageError
where
    T: Into<StowageErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Stowage operations.
pub type StowageResult<T> = std::result::Result<T, StowageError>;
