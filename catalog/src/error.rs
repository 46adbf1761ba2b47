//! Error types for the expectation catalog.

use thiserror::Error;

/// Result type alias for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur in the expectation catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Expectation not found.
    #[error("expectation not found: {0}")]
    NotFound(String),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
