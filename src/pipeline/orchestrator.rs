//! Two-stage diagnosis: gatekeeper → specialist → confidence threshold.
//!
//! Outcomes that are not diagnoses (unsupported modality, low confidence)
//! are ordinary `Outcome` values; only stage failures are errors.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::disease_info::DiseaseInfoTable;
use crate::modality::ModalityLabel;

use super::dispatch::SpecialistTable;
use super::gatekeeper::Gatekeeper;
use super::DiagnosisError;

/// Scores strictly below this percentage are low confidence.
pub const CONFIDENCE_THRESHOLD: f64 = 75.0;

pub const LOW_CONFIDENCE_FINDING: &str =
    "Model confidence is below the threshold for a reliable diagnosis.";
pub const LOW_CONFIDENCE_RECOMMENDATION: &str =
    "Please use a clearer or more standard image and try again.";

/// Successful result of a diagnosis request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    /// Gatekeeper chose `other`; no specialist ran.
    Rejected,
    /// Specialist result under the threshold; disease info withheld.
    LowConfidence {
        predicted_disease: String,
        confidence_score: f64,
    },
    Diagnosed {
        predicted_disease: String,
        confidence_score: f64,
        key_findings: Vec<String>,
        recommendation: Vec<String>,
    },
}

pub fn is_low_confidence(confidence_score: f64) -> bool {
    confidence_score < CONFIDENCE_THRESHOLD
}

pub struct DiagnosisPipeline {
    gatekeeper: Gatekeeper,
    specialists: SpecialistTable,
    disease_info: DiseaseInfoTable,
}

impl DiagnosisPipeline {
    pub fn new(
        gatekeeper: Gatekeeper,
        specialists: SpecialistTable,
        disease_info: DiseaseInfoTable,
    ) -> Self {
        Self {
            gatekeeper,
            specialists,
            disease_info,
        }
    }

    pub fn specialist_modalities(&self) -> Vec<ModalityLabel> {
        self.specialists.modalities()
    }

    /// Run the full pipeline on an image file. Blocks for the duration of
    /// both inference calls.
    pub fn diagnose(&self, image_path: &Path) -> Result<Outcome, DiagnosisError> {
        let verdict = self
            .gatekeeper
            .classify(image_path)
            .map_err(DiagnosisError::Gatekeeper)?;

        if verdict.modality == ModalityLabel::Other {
            info!("Image rejected: unsupported modality");
            return Ok(Outcome::Rejected);
        }

        let entry = self.specialists.get(verdict.modality).ok_or_else(|| {
            DiagnosisError::Specialist(format!(
                "no specialist configured for {}",
                verdict.modality
            ))
        })?;

        let input = entry
            .preprocess(image_path)
            .map_err(|e| DiagnosisError::Specialist(e.to_string()))?;
        let scores = entry
            .model
            .predict(&input)
            .map_err(|e| DiagnosisError::Specialist(e.to_string()))?;
        let (predicted_disease, decision) = entry
            .decide(&scores)
            .map_err(|e| DiagnosisError::Specialist(e.to_string()))?;
        let confidence_score = decision.confidence_score();

        if is_low_confidence(confidence_score) {
            warn!(
                modality = %verdict.modality,
                predicted = %predicted_disease,
                confidence_score,
                "Low confidence prediction"
            );
            return Ok(Outcome::LowConfidence {
                predicted_disease,
                confidence_score,
            });
        }

        let info = self.disease_info.lookup(&predicted_disease);
        info!(
            modality = %verdict.modality,
            predicted = %predicted_disease,
            confidence_score,
            "Diagnosis complete"
        );

        Ok(Outcome::Diagnosed {
            predicted_disease,
            confidence_score,
            key_findings: info.key_findings,
            recommendation: info.recommendation,
        })
    }
}
