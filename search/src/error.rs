//! Error types for the embedding engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur in the embedding engine.
#[derive(Error, Debug)]
pub enum SearchError {
    /// No provider credential is configured. Not retryable; the fix is
    /// configuration, so this is kept distinct from transient failure.
    #[error("embedding service not configured")]
    ProviderUnavailable,

    /// The anchor expectation has no stored embedding yet.
    #[error("no embedding found for expectation {0}")]
    EmbeddingNotFound(String),

    /// The expectation ID does not exist in the catalog.
    #[error("expectation not found: {0}")]
    ExpectationNotFound(String),

    /// A required input was missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The provider degraded to null for a single-item generation.
    #[error("failed to generate embedding for expectation {0}")]
    EmbeddingFailed(String),

    /// Embedding subsystem error.
    #[error("embedding error: {0}")]
    Embedding(#[from] planbook_embeddings::EmbeddingError),

    /// Catalog error.
    #[error("catalog error: {0}")]
    Catalog(#[from] planbook_catalog::CatalogError),
}
