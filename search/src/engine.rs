//! The embedding engine.
//!
//! One dependency-injected service owns every operation over embeddings:
//! cache-or-create for single expectations, chunked batch generation, the
//! missing-embedding sweep, similarity queries, and stale-model cleanup.
//! The store is the single source of truth; nothing here caches vectors
//! in process memory between calls.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use planbook_catalog::{CatalogStore, Expectation};
use planbook_embeddings::similarity::rank_candidates;
use planbook_embeddings::{Embedding, EmbeddingProvider, EmbeddingRecord, EmbeddingStore};

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};

/// One expectation to embed: its ID and the projected text.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    /// Expectation ID.
    pub id: String,

    /// Text to embed (canonically `"{code}: {description}"`).
    pub text: String,
}

impl EmbeddingInput {
    /// Build the input for an expectation.
    pub fn from_expectation(expectation: &Expectation) -> Self {
        Self {
            id: expectation.id.clone(),
            text: expectation.embeddable_text(),
        }
    }
}

/// A similarity query hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// The matched expectation.
    #[serde(rename = "outcome")]
    pub expectation: Expectation,

    /// Cosine similarity against the query, in [-1, 1].
    pub similarity: f32,
}

/// Snapshot of embedding coverage for the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingStatus {
    /// Whether the provider currently holds a credential.
    pub available: bool,

    /// Expectations in the catalog.
    pub total: usize,

    /// Expectations with a stored embedding.
    pub embedded: usize,

    /// Expectations without one.
    pub missing: usize,

    /// The configured embedding model.
    pub model: String,
}

/// Embedding engine over a provider, record store, and catalog.
pub struct EmbeddingEngine {
    /// Remote embedding provider.
    provider: Arc<dyn EmbeddingProvider>,

    /// Durable embedding records.
    store: EmbeddingStore,

    /// The expectations being embedded (read-only here).
    catalog: CatalogStore,

    /// Engine tunables.
    config: SearchConfig,
}

impl EmbeddingEngine {
    /// Create an engine with default configuration.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        store: EmbeddingStore,
        catalog: CatalogStore,
    ) -> Self {
        Self {
            provider,
            store,
            catalog,
            config: SearchConfig::default(),
        }
    }

    /// Override the configuration.
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Whether the provider currently holds a credential.
    pub fn provider_available(&self) -> bool {
        self.provider.is_available()
    }

    /// The model embeddings are generated with.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Return the stored embedding for an expectation, computing and
    /// persisting one on a cache miss.
    ///
    /// Returns `Ok(None)` when the provider degraded to null; nothing is
    /// stored in that case, so a later call can retry.
    pub async fn get_or_create(
        &self,
        expectation_id: &str,
        text: &str,
    ) -> Result<Option<EmbeddingRecord>> {
        if let Some(existing) = self.store.get(expectation_id).await? {
            debug!("Embedding cache hit for {expectation_id}");
            return Ok(Some(existing));
        }

        if !self.provider.is_available() {
            return Err(SearchError::ProviderUnavailable);
        }

        let Some(vector) = self.provider.embed_one(text).await else {
            return Ok(None);
        };

        let record = EmbeddingRecord::new(expectation_id, vector, self.provider.model());
        self.store.upsert_one(&record).await?;
        debug!("Created embedding for {expectation_id}");
        Ok(Some(record))
    }

    /// Embed many expectations, chunked to the provider's batch ceiling.
    ///
    /// Chunks run strictly sequentially with a fixed pause between them.
    /// Expectations that already have a record pass through unchanged
    /// (unless `force`, which re-embeds and overwrites). A failed chunk
    /// is logged and skipped; the remaining chunks still run, so the
    /// returned records can be fewer than the inputs. Callers re-run the
    /// sweep to pick up stragglers.
    pub async fn generate_batch(
        &self,
        items: &[EmbeddingInput],
        force: bool,
    ) -> Result<Vec<EmbeddingRecord>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        if !self.provider.is_available() {
            return Err(SearchError::ProviderUnavailable);
        }

        let chunk_count = items.len().div_ceil(self.config.batch_ceiling);
        let mut results = Vec::with_capacity(items.len());

        for (chunk_index, chunk) in items.chunks(self.config.batch_ceiling).enumerate() {
            let stored_ids = self.store.ids().await?;

            let (already_embedded, to_embed): (Vec<&EmbeddingInput>, Vec<&EmbeddingInput>) =
                if force {
                    (Vec::new(), chunk.iter().collect())
                } else {
                    chunk.iter().partition(|item| stored_ids.contains(&item.id))
                };

            for item in already_embedded {
                if let Some(record) = self.store.get(&item.id).await? {
                    results.push(record);
                }
            }

            if !to_embed.is_empty() {
                let texts: Vec<String> = to_embed.iter().map(|item| item.text.clone()).collect();

                match self.provider.embed_batch(&texts).await {
                    Some(vectors) => {
                        // The adapter guarantees one vector per text, in order
                        let records: Vec<EmbeddingRecord> = to_embed
                            .iter()
                            .zip(vectors)
                            .map(|(item, vector)| {
                                EmbeddingRecord::new(&item.id, vector, self.provider.model())
                            })
                            .collect();

                        self.store.upsert_many(&records).await?;
                        results.extend(records);
                    }
                    None => {
                        warn!(
                            "Chunk {}/{chunk_count} failed to embed; {} expectations remain unembedded",
                            chunk_index + 1,
                            to_embed.len()
                        );
                    }
                }
            }

            if chunk_index + 1 < chunk_count {
                sleep(self.config.batch_delay).await;
            }
        }

        info!(
            "Batch generation produced {} of {} records",
            results.len(),
            items.len()
        );
        Ok(results)
    }

    /// Embed every expectation that has no stored embedding yet (all of
    /// them when `force`). Returns the number of records produced.
    pub async fn generate_missing(&self, force: bool) -> Result<usize> {
        let expectations = self.catalog.find_all().await?;

        let selection: Vec<Expectation> = if force {
            expectations
        } else {
            let stored_ids = self.store.ids().await?;
            expectations
                .into_iter()
                .filter(|e| !stored_ids.contains(&e.id))
                .collect()
        };

        if selection.is_empty() {
            info!("All expectations already embedded; nothing to do");
            return Ok(0);
        }

        info!("Generating embeddings for {} expectations", selection.len());
        let items: Vec<EmbeddingInput> = selection
            .iter()
            .map(EmbeddingInput::from_expectation)
            .collect();

        let generated = self.generate_batch(&items, force).await?;
        Ok(generated.len())
    }

    /// Generate (or return the cached) embedding for one expectation,
    /// looked up by catalog ID.
    pub async fn generate_for_expectation(&self, expectation_id: &str) -> Result<EmbeddingRecord> {
        let expectation = self
            .catalog
            .get(expectation_id)
            .await?
            .ok_or_else(|| SearchError::ExpectationNotFound(expectation_id.to_string()))?;

        match self
            .get_or_create(&expectation.id, &expectation.embeddable_text())
            .await?
        {
            Some(record) => Ok(record),
            None => Err(SearchError::EmbeddingFailed(expectation_id.to_string())),
        }
    }

    /// Find expectations similar to an anchor expectation.
    ///
    /// Fails with [`SearchError::EmbeddingNotFound`] when the anchor has
    /// no stored embedding; generate it first. `threshold` and `limit`
    /// default from the engine config.
    pub async fn find_similar_to(
        &self,
        anchor_id: &str,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarityResult>> {
        let threshold = threshold.unwrap_or(self.config.similar_threshold);
        let limit = limit.unwrap_or(self.config.similar_limit);

        let anchor = self
            .store
            .get(anchor_id)
            .await?
            .ok_or_else(|| SearchError::EmbeddingNotFound(anchor_id.to_string()))?;

        let others = self.store.find_many_excluding(anchor_id).await?;
        self.rank_against(&anchor.embedding, others, threshold, limit)
            .await
    }

    /// Find expectations similar to free text.
    ///
    /// Embeds the query on the fly. Degrades to an empty result when the
    /// provider is unconfigured or the query embed fails; there is no
    /// pre-existing anchor to miss, so a search box should see "no
    /// results" rather than an error.
    pub async fn search_by_text(
        &self,
        query: &str,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarityResult>> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidInput("query must not be empty".into()));
        }

        let threshold = threshold.unwrap_or(self.config.search_threshold);
        let limit = limit.unwrap_or(self.config.search_limit);

        if !self.provider.is_available() {
            debug!("Free-text search with no provider configured; returning empty");
            return Ok(Vec::new());
        }

        let Some(query_embedding) = self.provider.embed_one(query).await else {
            warn!("Failed to embed search query; returning empty");
            return Ok(Vec::new());
        };

        let records = self.store.find_all().await?;
        self.rank_against(&query_embedding, records, threshold, limit)
            .await
    }

    /// Delete embedding records generated by a model other than the
    /// currently configured one. Returns the number deleted.
    pub async fn cleanup_old(&self) -> Result<usize> {
        let deleted = self
            .store
            .delete_where_model_not(self.provider.model())
            .await?;
        Ok(deleted)
    }

    /// Embedding coverage for the status endpoint.
    pub async fn status(&self) -> Result<EmbeddingStatus> {
        let expectations = self.catalog.find_all().await?;
        let stored_ids = self.store.ids().await?;

        let total = expectations.len();
        let embedded = expectations
            .iter()
            .filter(|e| stored_ids.contains(&e.id))
            .count();

        Ok(EmbeddingStatus {
            available: self.provider.is_available(),
            total,
            embedded,
            missing: total - embedded,
            model: self.provider.model().to_string(),
        })
    }

    /// Score records against a query vector and attach expectation
    /// snapshots to the survivors.
    async fn rank_against(
        &self,
        query: &Embedding,
        records: Vec<EmbeddingRecord>,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>> {
        let candidates: Vec<(String, Embedding)> = records
            .into_iter()
            .map(|r| (r.expectation_id, r.embedding))
            .collect();

        let scored = rank_candidates(query, &candidates, threshold, limit)?;

        let mut results = Vec::with_capacity(scored.len());
        for candidate in scored {
            match self.catalog.get(&candidate.id).await? {
                Some(expectation) => results.push(SimilarityResult {
                    expectation,
                    similarity: candidate.score,
                }),
                None => {
                    warn!(
                        "Embedding record {} has no catalog entry; skipping",
                        candidate.id
                    );
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Deterministic provider: vectors come from a fixed table (or a
    /// fallback), and every call is counted.
    struct FakeProvider {
        available: bool,
        vectors: HashMap<String, Embedding>,
        fallback: Embedding,
        one_calls: AtomicUsize,
        batch_calls: AtomicUsize,
        fail_first_batches: AtomicUsize,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                available: true,
                vectors: HashMap::new(),
                fallback: vec![1.0, 0.0, 0.0],
                one_calls: AtomicUsize::new(0),
                batch_calls: AtomicUsize::new(0),
                fail_first_batches: AtomicUsize::new(0),
            }
        }

        fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::new()
            }
        }

        fn with_vector(mut self, text: &str, vector: Embedding) -> Self {
            self.vectors.insert(text.to_string(), vector);
            self
        }

        fn failing_first_batches(self, n: usize) -> Self {
            self.fail_first_batches.store(n, Ordering::SeqCst);
            self
        }

        fn vector_for(&self, text: &str) -> Embedding {
            self.vectors.get(text).cloned().unwrap_or_else(|| self.fallback.clone())
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        fn model(&self) -> &str {
            "fake-model"
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn is_available(&self) -> bool {
            self.available
        }

        async fn embed_one(&self, text: &str) -> Option<Embedding> {
            self.one_calls.fetch_add(1, Ordering::SeqCst);
            Some(self.vector_for(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Option<Vec<Embedding>> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            let failures = self.fail_first_batches.load(Ordering::SeqCst);
            if failures > 0 {
                self.fail_first_batches.store(failures - 1, Ordering::SeqCst);
                return None;
            }
            Some(texts.iter().map(|t| self.vector_for(t)).collect())
        }
    }

    struct Fixture {
        engine: EmbeddingEngine,
        provider: Arc<FakeProvider>,
        _temp_dir: TempDir,
    }

    async fn fixture(provider: FakeProvider) -> Fixture {
        fixture_with_config(
            provider,
            SearchConfig::default().with_batch_delay(Duration::ZERO),
        )
        .await
    }

    async fn fixture_with_config(provider: FakeProvider, config: SearchConfig) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = EmbeddingStore::new(temp_dir.path().join("embeddings"))
            .await
            .unwrap();
        let catalog = CatalogStore::new(temp_dir.path().join("catalog"))
            .await
            .unwrap();

        let provider = Arc::new(provider);
        let engine = EmbeddingEngine::new(provider.clone(), store, catalog).with_config(config);

        Fixture {
            engine,
            provider,
            _temp_dir: temp_dir,
        }
    }

    async fn seed_expectation(engine: &EmbeddingEngine, id: &str, code: &str, description: &str) {
        engine
            .catalog
            .upsert(&Expectation::new(id, code, description, "Mathematics", 1))
            .await
            .unwrap();
    }

    async fn seed_record(engine: &EmbeddingEngine, id: &str, embedding: Embedding, model: &str) {
        engine
            .store
            .upsert_one(&EmbeddingRecord::new(id, embedding, model))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_or_create_hits_cache_on_second_call() {
        let f = fixture(FakeProvider::new()).await;

        let first = f.engine.get_or_create("e1", "A1: count").await.unwrap().unwrap();
        let second = f.engine.get_or_create("e1", "A1: count").await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(f.provider.one_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_unavailable_provider_errors() {
        let f = fixture(FakeProvider::unavailable()).await;

        let result = f.engine.get_or_create("e1", "A1: count").await;
        assert!(matches!(result, Err(SearchError::ProviderUnavailable)));
    }

    #[tokio::test]
    async fn test_generate_batch_covers_all_new_items_in_minimal_calls() {
        let config = SearchConfig::default()
            .with_batch_ceiling(50)
            .with_batch_delay(Duration::ZERO);
        let f = fixture_with_config(FakeProvider::new(), config).await;

        let items: Vec<EmbeddingInput> = (0..60)
            .map(|i| EmbeddingInput {
                id: format!("e{i:02}"),
                text: format!("E{i:02}: expectation {i}"),
            })
            .collect();

        let records = f.engine.generate_batch(&items, false).await.unwrap();

        assert_eq!(records.len(), 60);
        assert_eq!(f.provider.batch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.engine.store.count().await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_generate_batch_skips_already_embedded() {
        let f = fixture(FakeProvider::new()).await;
        seed_record(&f.engine, "e0", vec![0.5, 0.5, 0.0], "fake-model").await;

        let items = vec![
            EmbeddingInput {
                id: "e0".into(),
                text: "E0: already embedded".into(),
            },
            EmbeddingInput {
                id: "e1".into(),
                text: "E1: new".into(),
            },
        ];

        let records = f.engine.generate_batch(&items, false).await.unwrap();

        assert_eq!(records.len(), 2);
        // Pass-through kept the stored vector rather than re-embedding
        let kept = records.iter().find(|r| r.expectation_id == "e0").unwrap();
        assert_eq!(kept.embedding, vec![0.5, 0.5, 0.0]);
    }

    #[tokio::test]
    async fn test_generate_batch_force_overwrites() {
        let f = fixture(FakeProvider::new()).await;
        seed_record(&f.engine, "e0", vec![0.5, 0.5, 0.0], "fake-model").await;

        let items = vec![EmbeddingInput {
            id: "e0".into(),
            text: "E0: regenerate me".into(),
        }];

        let records = f.engine.generate_batch(&items, true).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(f.provider.batch_calls.load(Ordering::SeqCst), 1);
        let stored = f.engine.store.get("e0").await.unwrap().unwrap();
        assert_eq!(stored.embedding, vec![1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_generate_batch_failed_chunk_does_not_abort_run() {
        let config = SearchConfig::default()
            .with_batch_ceiling(50)
            .with_batch_delay(Duration::ZERO);
        let provider = FakeProvider::new().failing_first_batches(1);
        let f = fixture_with_config(provider, config).await;

        let items: Vec<EmbeddingInput> = (0..60)
            .map(|i| EmbeddingInput {
                id: format!("e{i:02}"),
                text: format!("E{i:02}: expectation {i}"),
            })
            .collect();

        let records = f.engine.generate_batch(&items, false).await.unwrap();

        // First chunk of 50 was lost, second chunk of 10 landed
        assert_eq!(records.len(), 10);
        assert_eq!(f.provider.batch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_find_similar_filters_and_ranks() {
        let f = fixture(FakeProvider::new()).await;
        seed_expectation(&f.engine, "anchor", "A1", "count to 10").await;
        seed_expectation(&f.engine, "close", "A2", "count to 20").await;
        seed_expectation(&f.engine, "far", "B1", "identify shapes").await;

        seed_record(&f.engine, "anchor", vec![1.0, 0.0, 0.0], "fake-model").await;
        seed_record(&f.engine, "close", vec![0.9, 0.1, 0.0], "fake-model").await;
        seed_record(&f.engine, "far", vec![0.0, 1.0, 0.0], "fake-model").await;

        let results = f
            .engine
            .find_similar_to("anchor", Some(0.5), Some(10))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].expectation.id, "close");
        assert!((results[0].similarity - 0.9938).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_find_similar_missing_anchor_is_not_found() {
        let f = fixture(FakeProvider::new()).await;

        let result = f.engine.find_similar_to("ghost", None, None).await;
        assert!(matches!(result, Err(SearchError::EmbeddingNotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_search_by_text_unavailable_degrades_to_empty() {
        let f = fixture(FakeProvider::unavailable()).await;
        seed_expectation(&f.engine, "e1", "A1", "count to 10").await;
        seed_record(&f.engine, "e1", vec![1.0, 0.0, 0.0], "fake-model").await;

        let results = f.engine.search_by_text("counting", None, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_by_text_blank_query_is_invalid() {
        let f = fixture(FakeProvider::new()).await;

        let result = f.engine.search_by_text("   ", None, None).await;
        assert!(matches!(result, Err(SearchError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_search_by_text_scores_against_all_records() {
        let provider = FakeProvider::new().with_vector("counting", vec![1.0, 0.0, 0.0]);
        let f = fixture(provider).await;

        seed_expectation(&f.engine, "e1", "A1", "count to 10").await;
        seed_expectation(&f.engine, "e2", "B1", "identify shapes").await;
        seed_record(&f.engine, "e1", vec![0.9, 0.1, 0.0], "fake-model").await;
        seed_record(&f.engine, "e2", vec![0.0, 1.0, 0.0], "fake-model").await;

        let results = f
            .engine
            .search_by_text("counting", Some(0.5), None)
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].expectation.id, "e1");
    }

    #[tokio::test]
    async fn test_generate_missing_with_nothing_to_do() {
        let f = fixture(FakeProvider::new()).await;
        seed_expectation(&f.engine, "e1", "A1", "count to 10").await;
        seed_record(&f.engine, "e1", vec![1.0, 0.0, 0.0], "fake-model").await;

        let generated = f.engine.generate_missing(false).await.unwrap();

        assert_eq!(generated, 0);
        assert_eq!(f.provider.batch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.provider.one_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_missing_embeds_only_the_gap() {
        let f = fixture(FakeProvider::new()).await;
        seed_expectation(&f.engine, "e1", "A1", "count to 10").await;
        seed_expectation(&f.engine, "e2", "A2", "count to 20").await;
        seed_record(&f.engine, "e1", vec![1.0, 0.0, 0.0], "fake-model").await;

        let generated = f.engine.generate_missing(false).await.unwrap();

        assert_eq!(generated, 1);
        assert!(f.engine.store.get("e2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cleanup_old_removes_stale_models_only() {
        let f = fixture(FakeProvider::new()).await;
        seed_record(&f.engine, "stale", vec![1.0, 0.0, 0.0], "model-v1").await;
        seed_record(&f.engine, "current", vec![0.0, 1.0, 0.0], "fake-model").await;

        assert_eq!(f.engine.cleanup_old().await.unwrap(), 1);
        assert!(f.engine.store.get("current").await.unwrap().is_some());
        assert!(f.engine.store.get("stale").await.unwrap().is_none());

        // Second call is a no-op
        assert_eq!(f.engine.cleanup_old().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_counts_coverage() {
        let f = fixture(FakeProvider::new()).await;
        seed_expectation(&f.engine, "e1", "A1", "count to 10").await;
        seed_expectation(&f.engine, "e2", "A2", "count to 20").await;
        seed_record(&f.engine, "e1", vec![1.0, 0.0, 0.0], "fake-model").await;

        let status = f.engine.status().await.unwrap();

        assert!(status.available);
        assert_eq!(status.total, 2);
        assert_eq!(status.embedded, 1);
        assert_eq!(status.missing, 1);
        assert_eq!(status.model, "fake-model");
    }

    #[tokio::test]
    async fn test_generate_for_expectation_unknown_id() {
        let f = fixture(FakeProvider::new()).await;

        let result = f.engine.generate_for_expectation("ghost").await;
        assert!(matches!(result, Err(SearchError::ExpectationNotFound(id)) if id == "ghost"));
    }
}
