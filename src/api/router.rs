//! HTTP router.
//!
//! Routes:
//! - `GET /` upload page
//! - `POST /predict` two-stage diagnosis
//! - `GET /health` liveness probe
//!
//! The body limit applies to every route; the trace layer is outermost.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the application router around a shared `ApiContext`.
pub fn app_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.config.max_upload_bytes;

    Router::new()
        .route("/", get(endpoints::index::page))
        .route("/predict", post(endpoints::predict::predict))
        .route("/health", get(endpoints::health::check))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::disease_info::DiseaseInfoTable;
    use crate::inference::{ClassifierModel, FailingModel, StaticModel};
    use crate::modality::ModalityLabel;
    use crate::pipeline::{DiagnosisPipeline, Gatekeeper, SpecialistTable};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "medtriage-test-boundary";
    const DISEASE_INFO: &str = r#"{
        "pneumonia": {"key_findings": ["Lung opacity"], "recommendation": ["Consult a pulmonologist"]}
    }"#;

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(40, 30, Rgb([90, 100, 110]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn gatekeeper_scores(modality: ModalityLabel) -> Vec<f32> {
        ModalityLabel::GATEKEEPER_ORDER
            .iter()
            .map(|m| if *m == modality { 0.9 } else { 0.025 })
            .collect()
    }

    fn test_ctx(
        upload_dir: &Path,
        gatekeeper: Arc<dyn ClassifierModel>,
        chest: Arc<dyn ClassifierModel>,
    ) -> ApiContext {
        let mut models: HashMap<ModalityLabel, Arc<dyn ClassifierModel>> = ModalityLabel::DIAGNOSABLE
            .into_iter()
            .map(|m| {
                let model: Arc<dyn ClassifierModel> =
                    Arc::new(StaticModel::new(m.as_str(), vec![0.99]));
                (m, model)
            })
            .collect();
        models.insert(ModalityLabel::ChestXray, chest);

        let pipeline = DiagnosisPipeline::new(
            Gatekeeper::new(gatekeeper),
            SpecialistTable::standard(models).unwrap(),
            DiseaseInfoTable::from_json(DISEASE_INFO).unwrap(),
        );
        let config = AppConfig::from_lookup(|key| match key {
            "MEDTRIAGE_UPLOAD_DIR" => Some(upload_dir.display().to_string()),
            "MEDTRIAGE_MAX_UPLOAD_MB" => Some("1".to_string()),
            _ => None,
        });
        ApiContext::new(pipeline, config)
    }

    fn chest_ctx(upload_dir: &Path, chest_score: f32) -> ApiContext {
        test_ctx(
            upload_dir,
            Arc::new(StaticModel::new(
                "gatekeeper",
                gatekeeper_scores(ModalityLabel::ChestXray),
            )),
            Arc::new(StaticModel::new("chest", vec![chest_score])),
        )
    }

    /// Hand-built multipart body: `(field name, filename, content)` per part.
    fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let disposition = match filename {
                Some(f) => format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                ),
                None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
            };
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(ctx: ApiContext, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app_router(ctx).oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn index_serves_html() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app_router(chest_ctx(dir.path(), 0.1)).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("/predict"));
    }

    #[tokio::test]
    async fn health_lists_specialists() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, json) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
        assert_eq!(json["specialists"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn missing_file_part_returns_400() {
        let dir = tempfile::tempdir().unwrap();
        let req = multipart_request(&[("note", None, &b"hello"[..])]);
        let (status, json) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file provided.");
    }

    #[tokio::test]
    async fn file_part_without_filename_returns_400() {
        let dir = tempfile::tempdir().unwrap();
        let req = multipart_request(&[("file", None, &b"just text"[..])]);
        let (status, json) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file provided.");
    }

    #[tokio::test]
    async fn empty_filename_returns_400() {
        let dir = tempfile::tempdir().unwrap();
        let req = multipart_request(&[("file", Some(""), &b""[..])]);
        let (status, json) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No selected file.");
    }

    #[tokio::test]
    async fn non_multipart_body_returns_400() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, json) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file provided.");
    }

    #[tokio::test]
    async fn other_modality_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let chest = Arc::new(StaticModel::new("chest", vec![0.1]));
        let ctx = test_ctx(
            dir.path(),
            Arc::new(StaticModel::new("gatekeeper", gatekeeper_scores(ModalityLabel::Other))),
            chest.clone(),
        );
        let png = png_bytes();
        let req = multipart_request(&[("file", Some("cat.png"), png.as_slice())]);
        let (status, json) = send(ctx, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!({"rejection": true, "message": "Image Type Not Supported"})
        );
        assert_eq!(chest.calls(), 0);
    }

    #[tokio::test]
    async fn confident_prediction_includes_disease_info() {
        let dir = tempfile::tempdir().unwrap();
        let png = png_bytes();
        // 0.1 → index 0 "PNEUMONIA" at 90%.
        let req = multipart_request(&[("file", Some("xray.png"), png.as_slice())]);
        let (status, json) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["predicted_disease"], "PNEUMONIA");
        let score = json["confidence_score"].as_f64().unwrap();
        assert!((score - 90.0).abs() < 1e-3, "score was {score}");
        assert_eq!(json["key_findings"], serde_json::json!(["Lung opacity"]));
        assert_eq!(
            json["recommendation"],
            serde_json::json!(["Consult a pulmonologist"])
        );
        assert!(json.get("warning").is_none());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn low_confidence_prediction_carries_warning() {
        let dir = tempfile::tempdir().unwrap();
        let png = png_bytes();
        // 0.4 → index 0 at 60%.
        let req = multipart_request(&[("file", Some("xray.png"), png.as_slice())]);
        let (status, json) = send(chest_ctx(dir.path(), 0.4), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["warning"], "Low Confidence Prediction");
        assert_eq!(json["predicted_disease"], "PNEUMONIA");
        assert_eq!(json["key_findings"].as_array().unwrap().len(), 1);
        assert_ne!(json["key_findings"][0], "Lung opacity");
    }

    #[tokio::test]
    async fn undecodable_upload_is_gatekeeper_failure() {
        let dir = tempfile::tempdir().unwrap();
        let req = multipart_request(&[("file", Some("notes.txt"), &b"definitely not an image"[..])]);
        let (status, json) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json["error"].as_str().unwrap();
        assert!(message.starts_with("Gatekeeper analysis failed: "), "{message}");
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn specialist_failure_is_diagnosis_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(
            dir.path(),
            Arc::new(StaticModel::new(
                "gatekeeper",
                gatekeeper_scores(ModalityLabel::ChestXray),
            )),
            Arc::new(FailingModel::new("session exploded")),
        );
        let png = png_bytes();
        let req = multipart_request(&[("file", Some("xray.png"), png.as_slice())]);
        let (status, json) = send(ctx, req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json["error"].as_str().unwrap();
        assert!(message.starts_with("Diagnosis failed: "), "{message}");
        assert!(message.contains("session exploded"));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![0u8; 2 * 1024 * 1024];
        let req = multipart_request(&[("file", Some("huge.png"), big.as_slice())]);
        let (status, _) = send(chest_ctx(dir.path(), 0.1), req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let response = app_router(chest_ctx(dir.path(), 0.1)).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
