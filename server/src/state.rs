//! Shared handler state.

use std::sync::Arc;

use planbook_search::EmbeddingEngine;

/// State threaded through every route handler.
#[derive(Clone)]
pub struct AppState {
    /// The embedding engine.
    pub engine: Arc<EmbeddingEngine>,

    /// Token required by mutating endpoints. When unset those endpoints
    /// are disabled rather than open.
    pub admin_token: Option<String>,
}

impl AppState {
    /// Create handler state.
    pub fn new(engine: Arc<EmbeddingEngine>, admin_token: Option<String>) -> Self {
        Self {
            engine,
            admin_token,
        }
    }
}
