//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::modality::ModalityLabel;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub specialists: Vec<ModalityLabel>,
}

/// `GET /health`: liveness probe listing the loaded specialists.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        specialists: ctx.pipeline.specialist_modalities(),
    })
}
