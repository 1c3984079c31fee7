//! Error types for nodewatch

use thiserror::Error;

/// Result type alias using nodewatch's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for nodewatch operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status
    #[error("API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Local state persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Terminal error
    #[error("Terminal error: {0}")]
    Tui(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a terminal error
    pub fn tui(msg: impl Into<String>) -> Self {
        Self::Tui(msg.into())
    }
}
