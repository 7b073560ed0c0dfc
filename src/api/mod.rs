//! HTTP surface: upload page, prediction endpoint and health probe.
//!
//! `app_router()` returns a composable `Router`; `start_server_on()` binds
//! and serves it in a background task.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;
pub mod upload;

pub use error::ApiError;
pub use router::app_router;
pub use server::{start_server_on, ApiServer};
pub use types::{ApiContext, PredictResponse};
