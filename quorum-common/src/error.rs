//! Error types shared by the Quorum crates.

use thiserror::Error;

/// Result type alias using the Quorum error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Quorum crates.
///
/// Only genuinely fatal conditions become errors. Undefined ratios inside a
/// computation (zero total weight, zero variance, ...) are substituted with
/// neutral values by the caller and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input to a core operation (empty opinion list, unknown strategy kind, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// External collaborator error (price feed, signal store)
    #[error("External service error: {0}")]
    External(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Shorthand for an [`Error::InvalidInput`].
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this is an input error, looking through context wrappers.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::WithContext { source, .. } => source.is_invalid_input(),
            _ => false,
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidInput(_) => 2,
            Self::Config(_) => 3,
            Self::NotFound(_) => 4,
            Self::External(_) => 5,
            Self::WithContext { source, .. } => source.exit_code(),
            _ => 1,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::invalid_input("empty").exit_code(), 2);
        assert_eq!(Error::Config("bad".into()).exit_code(), 3);
        assert_eq!(Error::NotFound("x".into()).exit_code(), 4);
        assert_eq!(Error::External("feed".into()).exit_code(), 5);
        assert_eq!(Error::Json(serde_json::from_str::<u8>("x").unwrap_err()).exit_code(), 1);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::invalid_input("no opinions");
        let with_ctx = err.with_context("aggregating AAPL");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert!(with_ctx.is_invalid_input());
        assert_eq!(
            with_ctx.to_string(),
            "aggregating AAPL: Invalid input: no opinions"
        );
    }

    #[test]
    fn test_result_ext_wraps_io_error() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let err = io.context("reading job file").unwrap_err();
        assert!(err.to_string().starts_with("reading job file"));
        assert!(!err.is_invalid_input());
        assert_eq!(Error::NotFound("AAPL".into()).with_context("fetching").exit_code(), 4);
    }
}
