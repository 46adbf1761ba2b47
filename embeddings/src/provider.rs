//! Embedding providers.
//!
//! The provider adapter owns all the messy parts of talking to a remote
//! embedding API: credentials, retries, rate limits, and response-order
//! guarantees. Transient failures never escape it; after the retry budget
//! is spent, `embed_one` and `embed_batch` degrade to `None` so a single
//! bad call cannot abort a larger generation run.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::backoff::RetryPolicy;
use crate::error::{EmbeddingError, Result};
use crate::{DEFAULT_DIMENSION, DEFAULT_MODEL};

/// Environment variable holding the provider credential.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Fixed timeout applied to every provider request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The model this provider embeds with.
    fn model(&self) -> &str;

    /// Output width of the model.
    fn dimensions(&self) -> usize;

    /// Check if the provider is available (API key set, etc.).
    fn is_available(&self) -> bool;

    /// Generate an embedding for a single text.
    ///
    /// Returns `None` when the text could not be embedded after the
    /// internal retry budget; the failure is logged, not raised.
    async fn embed_one(&self, text: &str) -> Option<Embedding>;

    /// Generate embeddings for a batch of texts.
    ///
    /// On success the output has exactly one vector per input, in input
    /// order. Returns `None` when the whole batch failed; callers treat
    /// those texts as still unembedded.
    async fn embed_batch(&self, texts: &[String]) -> Option<Vec<Embedding>>;
}

/// OpenAI embedding provider.
pub struct OpenAiProvider {
    /// Explicit API key; when unset, the environment is consulted per call.
    api_key: Option<String>,

    /// API base URL.
    base_url: String,

    /// HTTP client.
    client: reqwest::Client,

    /// Model to embed with.
    model: String,

    /// Declared output width for `model`.
    dimensions: usize,

    /// Retry budget for transient failures.
    retry: RetryPolicy,
}

impl OpenAiProvider {
    /// Create a provider that resolves its credential from the
    /// environment at call time.
    ///
    /// Reading the key lazily (rather than capturing it at construction)
    /// means toggling the environment variable flips `is_available()`
    /// without rebuilding the provider.
    pub fn from_env() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::new(),
            model: DEFAULT_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSION,
            retry: RetryPolicy::default(),
        }
    }

    /// Set an explicit API key, bypassing the environment.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.dimensions = declared_dimension(&self.model);
        self
    }

    /// Set the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve the credential: explicit key first, then the environment.
    fn resolve_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(ENV_OPENAI_API_KEY).ok())
            .filter(|key| !key.is_empty())
    }

    /// One embeddings API call for an ordered slice of texts.
    async fn request_embeddings(&self, texts: &[&str], api_key: &str) -> Result<Vec<Embedding>> {
        debug!(
            "Requesting embeddings for {} texts with model: {}",
            texts.len(),
            self.model
        );

        let body = serde_json::json!({
            "input": texts,
            "model": self.model,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::ApiRequest(format!(
                "API error: {error_text}"
            )));
        }

        let result: OpenAiEmbeddingResponse = response.json().await?;

        // The API is positional, but re-order by the index field anyway:
        // a response that can't be put back in input order is unusable.
        let mut data = result.data;
        data.sort_by_key(|item| item.index);

        if data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    /// Run a request through the retry state machine.
    ///
    /// Returns `None` once the budget is exhausted or when no credential
    /// can be resolved.
    async fn embed_with_retry(&self, texts: &[&str]) -> Option<Vec<Embedding>> {
        let Some(api_key) = self.resolve_key() else {
            warn!("Embedding request skipped: provider not configured");
            return None;
        };

        let mut backoff = self.retry.backoff();
        loop {
            match self.request_embeddings(texts, &api_key).await {
                Ok(vectors) => {
                    info!("Generated {} embeddings", vectors.len());
                    return Some(vectors);
                }
                Err(err) if err.is_transient() => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(
                            attempt = backoff.attempt(),
                            "Embedding request failed, retrying in {delay:?}: {err}"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        warn!("Embedding request failed after retries: {err}");
                        return None;
                    }
                },
                Err(err) => {
                    warn!("Embedding request failed permanently: {err}");
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        self.resolve_key().is_some()
    }

    async fn embed_one(&self, text: &str) -> Option<Embedding> {
        let mut vectors = self.embed_with_retry(&[text]).await?;
        vectors.pop()
    }

    async fn embed_batch(&self, texts: &[String]) -> Option<Vec<Embedding>> {
        if texts.is_empty() {
            return Some(Vec::new());
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.embed_with_retry(&refs).await
    }
}

/// Declared output width per model.
fn declared_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        _ => DEFAULT_DIMENSION,
    }
}

/// OpenAI API response format.
#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
