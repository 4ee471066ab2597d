//! Configuration error types.

/// Configuration error with source location.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", message, line, file)]
pub struct ConfigError {
    /// Error message
    pub message: String,
    /// Configuration file involved, if any
    pub path: Option<String>,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    ///
    /// # Examples
    ///
    /// ```
    /// use stowage_error::ConfigError;
    ///
    /// let err = ConfigError::new("Missing required field: cache.path");
    /// assert!(err.message.contains("cache.path"));
    /// assert!(err.path.is_none());
    /// ```
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            path: None,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Create a ConfigError tied to a configuration file.
    #[track_caller]
    pub fn in_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        let path = path.into();
        Self {
            message: format!("{}: {}", path, message.into()),
            path: Some(path),
            line: location.line(),
            file: location.file(),
        }
    }
}
