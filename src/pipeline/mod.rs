pub mod preprocess;
pub mod gatekeeper;
pub mod dispatch;
pub mod orchestrator;

pub use dispatch::{ClassificationMode, Decision, SpecialistEntry, SpecialistTable};
pub use gatekeeper::{Gatekeeper, GatekeeperVerdict};
pub use orchestrator::{DiagnosisPipeline, Outcome, CONFIDENCE_THRESHOLD};
pub use preprocess::{FixedShapePreprocessor, ImagePreprocessor, InputSpec, PreprocessError};

use thiserror::Error;

/// Failure of one of the two model stages. The display strings are the
/// user-facing error messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosisError {
    #[error("Gatekeeper analysis failed: {0}")]
    Gatekeeper(String),

    #[error("Diagnosis failed: {0}")]
    Specialist(String),
}
