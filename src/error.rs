//! Error types for the Bookgate service.

use thiserror::Error;

/// Main error type for Bookgate operations.
///
/// Admission itself never fails; these cover startup and configuration.
#[derive(Error, Debug)]
pub enum GovernorError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for GovernorError {
    fn from(err: config::ConfigError) -> Self {
        GovernorError::Config(err.to_string())
    }
}

/// Result type alias for Bookgate operations.
pub type Result<T> = std::result::Result<T, GovernorError>;
