//! # Search Engine
//!
//! This crate provides the embedding engine that ties together:
//!
//! - **Catalog**: the curriculum expectations being embedded
//! - **Provider**: remote embedding generation
//! - **Store**: durable embedding records
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Embedding Engine                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │  Expectation │  │  Embedding   │  │  Embedding   │          │
//! │  │   Catalog    │  │   Provider   │  │    Store     │          │
//! │  └──────────────┘  └──────────────┘  └──────────────┘          │
//! │         │                │                  │                   │
//! │         └────────────────┼──────────────────┘                   │
//! │                          ▼                                      │
//! │                  ┌──────────────┐                               │
//! │                  │  Embedding   │                               │
//! │                  │    Engine    │                               │
//! │                  └──────────────┘                               │
//! │                          │                                      │
//! │              cache-or-create · batch generation                 │
//! │              similarity search · sweep · cleanup                │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use planbook_search::EmbeddingEngine;
//!
//! let engine = EmbeddingEngine::new(provider, store, catalog);
//! let generated = engine.generate_missing(false).await?;
//! let similar = engine.find_similar_to("exp-42", None, None).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;

pub use config::SearchConfig;
pub use engine::{EmbeddingEngine, EmbeddingInput, EmbeddingStatus, SimilarityResult};
pub use error::{Result, SearchError};

// Re-export from dependencies for convenience
pub use planbook_catalog::{CatalogStore, Expectation};
pub use planbook_embeddings::{EmbeddingProvider, EmbeddingRecord, EmbeddingStore};
