use crate::services::error::PipelineError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    /// Failure whose message is safe and useful to show the caller
    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Body of every error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidFormat(_) | PipelineError::InvalidPath(_) => {
                AppError::BadRequest(err.to_string())
            }
            PipelineError::SourceNotFound(_) | PipelineError::SegmentNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            PipelineError::MergeFailed { .. }
            | PipelineError::TranscodeFailed { .. }
            | PipelineError::StagingUnavailable(_) => AppError::Internal(err.to_string()),
            PipelineError::Storage(e) => AppError::Anyhow(e),
            PipelineError::Io(e) => AppError::Anyhow(e.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => {
                tracing::error!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::NotFound(msg) => {
                tracing::error!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, msg)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            status: "error".to_string(),
            error: message,
        });

        (status, body).into_response()
    }
}
