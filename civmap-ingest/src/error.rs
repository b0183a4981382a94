//! Error types for civmap-ingest
//!
//! `IngestError` is the resolution/reconciliation taxonomy. Per-row pipeline
//! failures are logged and skipped, never propagated out of a batch.
//! `ApiError` maps failures onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Resolution and reconciliation errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// Structural parse and every geocoding candidate exhausted
    #[error("Address unresolved: {address} (tried {candidates} candidates)")]
    AddressUnresolved { address: String, candidates: usize },

    /// Transport or HTTP failure for one candidate query
    #[error("Geocode provider error for '{query}': {message}")]
    GeocodeProvider { query: String, message: String },

    /// Point resolved but lies outside every known boundary
    #[error("No enclosing polygon for {point} (address '{address}')")]
    NoEnclosingPolygon {
        address: String,
        point: civmap_common::GeoPoint,
    },

    /// Unsupported or broken geometry in the boundary dataset
    #[error("Malformed boundary geometry in feature {feature}: {reason}")]
    MalformedBoundaryGeometry { feature: usize, reason: String },

    /// A field needed type coercion; logged, never fatal
    #[error("Sanitized field '{field}': {from} coerced to {to}")]
    SanitizationFallback {
        field: String,
        from: &'static str,
        to: &'static str,
    },

    /// External source file unreadable or without a recognizable header
    #[error("Source {path}: {message}")]
    Source { path: String, message: String },

    /// Storage, config or IO failure
    #[error(transparent)]
    Common(#[from] civmap_common::Error),
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Common(err.into())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Common(err.into())
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(err: sqlx::Error) -> Self {
        IngestError::Common(err.into())
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Address could not be resolved to a village (422)
    #[error("Unresolved: {0}")]
    Unresolved(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// civmap-common error
    #[error("Common error: {0}")]
    Common(#[from] civmap_common::Error),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::AddressUnresolved { .. } | IngestError::NoEnclosingPolygon { .. } => {
                ApiError::Unresolved(err.to_string())
            }
            IngestError::Common(inner) => ApiError::Common(inner),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unresolved(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "UNRESOLVED", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(civmap_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(civmap_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
