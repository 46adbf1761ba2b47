//! # Embeddings
//!
//! This crate provides embedding generation, persistence, and similarity
//! math for Planbook's curriculum-expectation search.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert expectation text to dense vectors
//! - **Persistence**: One durable record per expectation, upsert semantics
//! - **Similarity**: Cosine scoring with threshold/limit ranking
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Embeddings System                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► EmbeddingStore            │
//! │       │                    │              │                     │
//! │       ▼                    ▼              ▼                     │
//! │  OpenAI API          rank_candidates  JSON records             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod backoff;
pub mod error;
pub mod provider;
pub mod record;
pub mod similarity;
pub mod store;

pub use backoff::{Backoff, RetryPolicy};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, OpenAiProvider};
pub use record::EmbeddingRecord;
pub use similarity::{ScoredCandidate, cosine_similarity, rank_candidates};
pub use store::EmbeddingStore;

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Output width of the default model.
pub const DEFAULT_DIMENSION: usize = 1536;
