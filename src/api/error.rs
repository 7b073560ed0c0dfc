//! API error types with flat JSON responses: `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::pipeline::DiagnosisError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No file provided.")]
    NoFileProvided,
    #[error("No selected file.")]
    NoSelectedFile,
    #[error("Failed to read file data.")]
    UnreadableUpload,
    #[error("Upload exceeds the size limit.")]
    PayloadTooLarge,
    #[error(transparent)]
    Diagnosis(#[from] DiagnosisError),
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFileProvided | ApiError::NoSelectedFile | ApiError::UnreadableUpload => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Diagnosis(_) | ApiError::Upload(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                "An internal error occurred".to_string()
            }
            ApiError::Diagnosis(e) => {
                tracing::error!(error = %e, "Prediction failed");
                e.to_string()
            }
            ApiError::Upload(detail) => {
                tracing::error!(detail, "Upload could not be stored");
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
