//! Configuration for the embedding engine.

use std::time::Duration;

/// Tunables for batch generation and similarity queries.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Maximum texts per provider call. The provider's batch ceiling and
    /// the generator's chunk size are deliberately the same knob.
    pub batch_ceiling: usize,

    /// Pause between chunks of a batch run. Simple fixed backpressure;
    /// no dynamic rate feedback.
    pub batch_delay: Duration,

    /// Default minimum similarity for anchor-based queries.
    pub similar_threshold: f32,

    /// Default result cap for anchor-based queries.
    pub similar_limit: usize,

    /// Default minimum similarity for free-text queries.
    pub search_threshold: f32,

    /// Default result cap for free-text queries.
    pub search_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            batch_ceiling: 100,
            batch_delay: Duration::from_millis(1000),
            similar_threshold: 0.8,
            similar_limit: 10,
            search_threshold: 0.7,
            search_limit: 20,
        }
    }
}

impl SearchConfig {
    /// Set the provider batch ceiling.
    pub fn with_batch_ceiling(mut self, ceiling: usize) -> Self {
        self.batch_ceiling = ceiling.max(1);
        self
    }

    /// Set the inter-chunk delay.
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }
}
