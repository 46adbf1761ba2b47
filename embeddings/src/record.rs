//! The persisted embedding record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Embedding;

/// One stored embedding per curriculum expectation.
///
/// Records are replaced whole: a forced regeneration or model change
/// writes a new record over the old one, never edits fields in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// ID of the expectation this embedding was computed from.
    pub expectation_id: String,

    /// The embedding vector.
    pub embedding: Embedding,

    /// Model that produced the vector.
    pub model: String,

    /// Length of the vector; always `embedding.len()`.
    pub dimensions: usize,

    /// When the record was first created.
    pub created_at: DateTime<Utc>,

    /// When the record was last replaced.
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    /// Create a record for a freshly computed embedding.
    pub fn new(
        expectation_id: impl Into<String>,
        embedding: Embedding,
        model: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let dimensions = embedding.len();
        Self {
            expectation_id: expectation_id.into(),
            embedding,
            model: model.into(),
            dimensions,
            created_at: now,
            updated_at: now,
        }
    }
}
