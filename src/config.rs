//! Application constants and runtime configuration.
//!
//! Every setting comes from a `MEDTRIAGE_*` environment variable with a
//! built-in default.

use std::net::SocketAddr;
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Application-level constants
pub const APP_NAME: &str = "medtriage";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_DISEASE_INFO: &str = "data/disease_info.json";
const DEFAULT_MAX_UPLOAD_MB: usize = 16;
const DEFAULT_ONNX_THREADS: usize = 1;
const BYTES_PER_MB: usize = 1024 * 1024;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "medtriage=info,medtriage_lib=info,tower_http=info"
}

// ═══════════════════════════════════════════════════════════
// Runtime configuration
// ═══════════════════════════════════════════════════════════

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub models_dir: PathBuf,
    pub disease_info_path: PathBuf,
    /// Directory for per-request upload files.
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub onnx_threads: usize,
}

impl AppConfig {
    /// Read `MEDTRIAGE_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// the default with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr: SocketAddr = parse_or(&lookup, "MEDTRIAGE_BIND", DEFAULT_BIND.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 5000)));
        let max_upload_mb: usize =
            parse_or(&lookup, "MEDTRIAGE_MAX_UPLOAD_MB", Some(DEFAULT_MAX_UPLOAD_MB))
                .unwrap_or(DEFAULT_MAX_UPLOAD_MB);
        let max_upload_bytes = max_upload_mb.checked_mul(BYTES_PER_MB).unwrap_or_else(|| {
            tracing::warn!(
                key = "MEDTRIAGE_MAX_UPLOAD_MB",
                value = max_upload_mb,
                "Upload limit overflows, using default"
            );
            DEFAULT_MAX_UPLOAD_MB * BYTES_PER_MB
        });
        let onnx_threads: usize =
            parse_or(&lookup, "MEDTRIAGE_ONNX_THREADS", Some(DEFAULT_ONNX_THREADS))
                .unwrap_or(DEFAULT_ONNX_THREADS)
                .max(1);

        Self {
            bind_addr,
            models_dir: lookup("MEDTRIAGE_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_DIR)),
            disease_info_path: lookup("MEDTRIAGE_DISEASE_INFO")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DISEASE_INFO)),
            upload_dir: lookup("MEDTRIAGE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            max_upload_bytes,
            onnx_threads,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: Option<T>) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid config value, using default");
                default
            }
        },
        None => default,
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
