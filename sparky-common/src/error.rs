//! Error types for the Sparky service.

use thiserror::Error;

/// Result type alias using the Sparky error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Sparky.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

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
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
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
    fn test_error_display() {
        assert_eq!(
            Error::Config("bad port".into()).to_string(),
            "Configuration error: bad port"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::InvalidInput("expected object".into());
        let with_ctx = err.with_context("parsing chat body");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert_eq!(
            with_ctx.to_string(),
            "parsing chat body: Invalid input: expected object"
        );
    }

    #[test]
    fn test_result_ext_context() {
        let res: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{");
        let err = res.context("parsing chat body").unwrap_err();
        assert!(err.to_string().starts_with("parsing chat body: JSON error"));
    }
}
