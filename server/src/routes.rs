//! Route handlers for the embeddings API.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use planbook_search::{EmbeddingStatus, SimilarityResult};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the admin token for gated endpoints.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Build the embeddings API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/embeddings/status", get(status_handler))
        .route("/embeddings/generate", post(generate_handler))
        .route("/embeddings/similar/{id}", get(similar_handler))
        .route("/embeddings/search", post(search_handler))
        .route("/embeddings/outcome/{id}", post(outcome_handler))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_outcomes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded_outcomes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_embeddings: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<EmbeddingStatus> for StatusResponse {
    fn from(status: EmbeddingStatus) -> Self {
        if status.available {
            Self {
                available: true,
                total_outcomes: Some(status.total),
                embedded_outcomes: Some(status.embedded),
                missing_embeddings: Some(status.missing),
                model: Some(status.model),
                message: None,
            }
        } else {
            Self {
                available: false,
                total_outcomes: None,
                embedded_outcomes: None,
                missing_embeddings: None,
                model: None,
                message: Some(
                    "Embedding service not configured; set OPENAI_API_KEY to enable".to_string(),
                ),
            }
        }
    }
}

async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let status = state.engine.status().await?;
    Ok(Json(status.into()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub generated: usize,
    pub message: String,
}

async fn generate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<GenerateResponse>, ApiError> {
    require_admin(&state, &headers)?;

    if !state.engine.provider_available() {
        return Err(ApiError::Unavailable);
    }

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let generated = state.engine.generate_missing(request.force_regenerate).await?;

    info!("Embedding generation run produced {generated} records");
    Ok(Json(GenerateResponse {
        generated,
        message: format!("Generated {generated} embeddings"),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct ResultsResponse {
    pub results: Vec<SimilarityResult>,
}

async fn similar_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<ResultsResponse>, ApiError> {
    if !state.engine.provider_available() {
        return Err(ApiError::Unavailable);
    }

    let results = state
        .engine
        .find_similar_to(&id, params.threshold, params.limit)
        .await?;

    Ok(Json(ResultsResponse { results }))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let query = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| {
            ApiError::Search(planbook_search::SearchError::InvalidInput(
                "query is required".to_string(),
            ))
        })?;

    if !state.engine.provider_available() {
        return Err(ApiError::Unavailable);
    }

    let results = state
        .engine
        .search_by_text(query, request.threshold, request.limit)
        .await?;

    Ok(Json(ResultsResponse { results }))
}

async fn outcome_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<OutcomeEmbeddingResponse>, ApiError> {
    require_admin(&state, &headers)?;

    if !state.engine.provider_available() {
        return Err(ApiError::Unavailable);
    }

    let record = state.engine.generate_for_expectation(&id).await?;

    Ok(Json(OutcomeEmbeddingResponse {
        outcome_id: record.expectation_id,
        model: record.model,
        dimensions: record.dimensions,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }))
}

/// Wire shape for a single generated embedding; the vector itself is
/// not returned, only its metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeEmbeddingResponse {
    pub outcome_id: String,
    pub model: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match (&state.admin_token, provided) {
        (Some(expected), Some(token)) if token == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}
