//! Gatekeeper stage: decide which modality an image belongs to.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::inference::ClassifierModel;
use crate::modality::ModalityLabel;

use super::dispatch::argmax;
use super::preprocess::{FixedShapePreprocessor, ImagePreprocessor, InputSpec};

/// Gatekeeper output: per-label scores plus the argmax modality.
#[derive(Debug, Clone, Serialize)]
pub struct GatekeeperVerdict {
    pub modality: ModalityLabel,
    pub scores: Vec<(ModalityLabel, f32)>,
}

impl GatekeeperVerdict {
    pub fn score_of(&self, modality: ModalityLabel) -> Option<f32> {
        self.scores
            .iter()
            .find(|(m, _)| *m == modality)
            .map(|(_, s)| *s)
    }
}

pub struct Gatekeeper {
    model: Arc<dyn ClassifierModel>,
    preprocessor: Arc<dyn ImagePreprocessor>,
}

impl Gatekeeper {
    pub fn new(model: Arc<dyn ClassifierModel>) -> Self {
        Self::with_preprocessor(
            model,
            Arc::new(FixedShapePreprocessor::new(InputSpec::GATEKEEPER)),
        )
    }

    pub fn with_preprocessor(
        model: Arc<dyn ClassifierModel>,
        preprocessor: Arc<dyn ImagePreprocessor>,
    ) -> Self {
        Self {
            model,
            preprocessor,
        }
    }

    /// Classify the image at `path`. Errors are returned as display strings;
    /// the caller owns the failure domain.
    pub fn classify(&self, path: &Path) -> Result<GatekeeperVerdict, String> {
        let input = self.preprocessor.preprocess(path).map_err(|e| e.to_string())?;
        let scores = self.model.predict(&input).map_err(|e| e.to_string())?;
        let verdict = verdict_from_scores(&scores)?;

        info!(
            model = self.model.name(),
            brain_tumor = scores[0],
            chest_xray = scores[1],
            skin_cancer = scores[2],
            bone_fracture = scores[3],
            other = scores[4],
            chosen = %verdict.modality,
            "Gatekeeper verdict"
        );

        Ok(verdict)
    }
}

/// Map a raw 5-score vector onto modality labels.
pub fn verdict_from_scores(scores: &[f32]) -> Result<GatekeeperVerdict, String> {
    let expected = ModalityLabel::GATEKEEPER_ORDER.len();
    if scores.len() != expected {
        return Err(format!(
            "gatekeeper returned {} scores, expected {expected}",
            scores.len()
        ));
    }
    let index = argmax(scores).ok_or_else(|| "gatekeeper returned no scores".to_string())?;
    let modality = ModalityLabel::from_gatekeeper_index(index)
        .ok_or_else(|| format!("gatekeeper index {index} has no label"))?;

    Ok(GatekeeperVerdict {
        modality,
        scores: ModalityLabel::GATEKEEPER_ORDER
            .into_iter()
            .zip(scores.iter().copied())
            .collect(),
    })
}
