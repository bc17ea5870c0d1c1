//! Error types for webhttrack-server
//!
//! This module defines the error types used throughout the server.
//! We use `thiserror` for ergonomic error definitions and `anyhow` for
//! error propagation in the binary.

use thiserror::Error;

/// Main error type for control-panel operations
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Language catalog errors (missing `lang.def` or language file)
    #[error("Language error: {0}")]
    Language(String),

    /// Requested resource is not allowed (path traversal)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Failure while writing profiles or project directories
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Crawl engine errors
    #[error("Engine error: {0}")]
    Engine(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using ServerError
pub type Result<T> = std::result::Result<T, ServerError>;

impl From<toml::de::Error> for ServerError {
    fn from(err: toml::de::Error) -> Self {
        ServerError::Config(err.to_string())
    }
}
