//! `POST /predict`: upload an image and run the two-stage diagnosis.

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, PredictResponse};
use crate::api::upload::ScopedUpload;
use crate::pipeline::Outcome;

const FILE_FIELD: &str = "file";

pub async fn predict(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Request body is not multipart");
        ApiError::NoFileProvided
    })?;

    let (filename, bytes) = read_file_field(&mut multipart).await?;
    tracing::info!(filename = %filename, size = bytes.len(), "Prediction requested");

    let pipeline = ctx.pipeline.clone();
    let upload_dir = ctx.config.upload_dir.clone();

    // The upload lives inside the blocking task; it is removed when the task ends.
    let outcome = tokio::task::spawn_blocking(move || -> Result<Outcome, ApiError> {
        let upload = ScopedUpload::store(&upload_dir, &filename, &bytes)
            .map_err(|e| ApiError::Upload(e.to_string()))?;
        Ok(pipeline.diagnose(upload.path())?)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("diagnosis task failed: {e}")))??;

    match &outcome {
        Outcome::Rejected => tracing::info!("Responding with rejection"),
        Outcome::LowConfidence { .. } => tracing::info!("Responding with low-confidence result"),
        Outcome::Diagnosed { predicted_disease, .. } => {
            tracing::info!(predicted = %predicted_disease, "Responding with diagnosis")
        }
    }

    Ok(Json(outcome.into()))
}

/// Find the first `file` part that carries a filename and read its bytes.
/// Parts named `file` without a filename are plain form fields and are skipped.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::NoFileProvided),
            Err(e) => return Err(stream_error(e, ApiError::NoFileProvided)),
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if filename.is_empty() {
            return Err(ApiError::NoSelectedFile);
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| stream_error(e, ApiError::UnreadableUpload))?;
        return Ok((filename, bytes));
    }
}

fn stream_error(err: MultipartError, fallback: ApiError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("Upload rejected by body limit");
        ApiError::PayloadTooLarge
    } else {
        tracing::warn!(error = %err.body_text(), "Malformed multipart body");
        fallback
    }
}
