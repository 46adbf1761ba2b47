//! API error type and HTTP status mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use planbook_search::SearchError;

/// Errors surfaced by route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Admin token missing or wrong.
    #[error("admin token required")]
    Unauthorized,

    /// Embedding provider has no credential.
    #[error("embedding service unavailable")]
    Unavailable,

    /// Engine error.
    #[error(transparent)]
    Search(#[from] SearchError),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Search(err) => match err {
                SearchError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                SearchError::EmbeddingNotFound(_) | SearchError::ExpectationNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                SearchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                SearchError::EmbeddingFailed(_) => StatusCode::BAD_GATEWAY,
                SearchError::Embedding(_) | SearchError::Catalog(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}
