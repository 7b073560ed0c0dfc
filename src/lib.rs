//! medtriage: two-stage medical image triage over HTTP.
//!
//! An upload is first classified by a gatekeeper model into one of five
//! modalities; supported modalities are routed to a specialist model whose
//! label and confidence become the response. `run()` loads everything once
//! and serves until Ctrl-C.

pub mod api;
pub mod config;
pub mod disease_info;
pub mod inference;
pub mod modality;
pub mod pipeline;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::AppConfig;
use crate::disease_info::{DiseaseInfoError, DiseaseInfoTable};
use crate::inference::{ClassifierModel, ModelCatalog, ModelError, ModelSpec};
use crate::pipeline::{DiagnosisPipeline, Gatekeeper, SpecialistTable};

// ═══════════════════════════════════════════════════════════
// Startup
// ═══════════════════════════════════════════════════════════

/// Startup failures. Any of these aborts the process before it binds.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Disease info: {0}")]
    DiseaseInfo(#[from] DiseaseInfoError),
    #[error("Model loading: {0}")]
    Model(#[from] ModelError),
    #[error("Pipeline assembly: {0}")]
    Pipeline(String),
    #[error("Server: {0}")]
    Server(String),
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Load the disease table and every model, then assemble the handler context.
pub fn build_context(config: AppConfig) -> Result<ApiContext, StartupError> {
    let threads = config.onnx_threads;
    build_context_with(config, |spec, path| load_model(spec, path, threads))
}

/// Same as [`build_context`] with a caller-supplied model loader.
pub fn build_context_with<F>(config: AppConfig, load: F) -> Result<ApiContext, StartupError>
where
    F: Fn(&ModelSpec, &Path) -> Result<Arc<dyn ClassifierModel>, ModelError>,
{
    let disease_info = DiseaseInfoTable::load(&config.disease_info_path)?;
    let models = ModelCatalog::default().load_with(&config.models_dir, load)?;

    let specialists =
        SpecialistTable::standard(models.specialists).map_err(StartupError::Pipeline)?;
    let pipeline = DiagnosisPipeline::new(
        Gatekeeper::new(models.gatekeeper),
        specialists,
        disease_info,
    );

    Ok(ApiContext::new(pipeline, config))
}

/// Serve until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let addr = config.bind_addr;
    let ctx = tokio::task::spawn_blocking(move || build_context(config))
        .await
        .map_err(|e| StartupError::Server(format!("startup task failed: {e}")))??;

    let mut server = api::start_server_on(ctx, addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    server.shutdown();
    server.stopped().await;
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Model backends
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx")]
fn load_model(
    spec: &ModelSpec,
    path: &Path,
    threads: usize,
) -> Result<Arc<dyn ClassifierModel>, ModelError> {
    let model = inference::OnnxClassifier::load(spec.name, path, threads)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_model(
    spec: &ModelSpec,
    _path: &Path,
    _threads: usize,
) -> Result<Arc<dyn ClassifierModel>, ModelError> {
    Err(ModelError::Unsupported(format!(
        "{}: built without the `onnx` feature",
        spec.name
    )))
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
