//! Error type for the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Error type for web API operations
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request with validation error
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Conflict (duplicate registration, sync already running, published post)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream provider failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body: a JSON object with an `error` string
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            WebError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            WebError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            WebError::Internal(msg) => {
                tracing::error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> Self {
        WebError::Internal(format!("{:#}", err))
    }
}
