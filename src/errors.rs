use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// Upstream answered 404 for the given URL.
    #[error("Upstream resource not found: {0}")]
    UpstreamNotFound(String),

    #[error("A standings rebuild is already in progress")]
    RebuildInProgress,

    #[error("No season has any finished events")]
    NoSeasonData,

    #[error("Standings cache is not ready yet")]
    NotReady,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalServiceError(_) | AppError::UpstreamNotFound(_) => {
                tracing::warn!("Upstream failure surfaced to client: {}", self);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::RebuildInProgress => (StatusCode::CONFLICT, self.to_string()),
            AppError::NotReady | AppError::NoSeasonData => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}
