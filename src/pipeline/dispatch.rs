//! Specialist dispatch: modality → (preprocessor, model, labels, mode).
//!
//! The table is built once at startup and never mutated. Decision rules turn
//! a raw score vector into a label index and the probability of that label.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::inference::{ClassifierModel, ImageTensor};
use crate::modality::ModalityLabel;

use super::preprocess::{FixedShapePreprocessor, ImagePreprocessor, InputSpec, PreprocessError};

/// Binary decision boundary. A score exactly at the boundary picks index 0.
pub const BINARY_DECISION_BOUNDARY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMode {
    /// One sigmoid output; index 1 is the positive class.
    Binary,
    /// One probability per label.
    Multiclass,
}

/// The chosen label index and its probability in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub index: usize,
    pub confidence: f64,
}

impl Decision {
    /// Confidence as a 0–100 percentage.
    pub fn confidence_score(&self) -> f64 {
        self.confidence * 100.0
    }
}

/// Binary rule: index 1 iff `score > 0.5`; confidence is the probability of
/// the chosen class, so it is always at least 0.5 for scores in [0, 1].
///
/// The complement is taken in `f32`, the model's output precision, before
/// widening.
pub fn decide_binary(score: f32) -> Decision {
    if f64::from(score) > BINARY_DECISION_BOUNDARY {
        Decision {
            index: 1,
            confidence: f64::from(score),
        }
    } else {
        Decision {
            index: 0,
            confidence: f64::from(1.0f32 - score),
        }
    }
}

/// Index of the largest score; the first one wins on ties. `None` if empty.
///
/// NaN never compares greater, so it is only chosen if it sits at index 0
/// and nothing beats it.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            None => best = Some((i, score)),
            Some((_, top)) if score > top => best = Some((i, score)),
            _ => {}
        }
    }
    best.map(|(i, _)| i)
}

/// Multiclass rule: argmax, confidence is the score at that index.
/// Scores are not required to sum to one.
pub fn decide_multiclass(scores: &[f32]) -> Option<Decision> {
    argmax(scores).map(|index| Decision {
        index,
        confidence: f64::from(scores[index]),
    })
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecisionError {
    #[error("model returned no scores")]
    EmptyOutput,
    #[error("predicted index {index} outside label list of {labels}")]
    LabelOutOfRange { index: usize, labels: usize },
}

/// One row of the dispatch table.
pub struct SpecialistEntry {
    pub modality: ModalityLabel,
    pub model: Arc<dyn ClassifierModel>,
    pub labels: Vec<String>,
    pub preprocessor: Arc<dyn ImagePreprocessor>,
    pub mode: ClassificationMode,
}

impl SpecialistEntry {
    /// Apply this entry's decision rule and resolve the label.
    pub fn decide(&self, scores: &[f32]) -> Result<(String, Decision), DecisionError> {
        let decision = match self.mode {
            ClassificationMode::Binary => {
                let score = scores.first().ok_or(DecisionError::EmptyOutput)?;
                decide_binary(*score)
            }
            ClassificationMode::Multiclass => {
                decide_multiclass(scores).ok_or(DecisionError::EmptyOutput)?
            }
        };
        let label = self
            .labels
            .get(decision.index)
            .ok_or(DecisionError::LabelOutOfRange {
                index: decision.index,
                labels: self.labels.len(),
            })?;
        Ok((label.clone(), decision))
    }

    pub fn preprocess(&self, path: &Path) -> Result<ImageTensor, PreprocessError> {
        self.preprocessor.preprocess(path)
    }
}

const CHEST_XRAY_LABELS: &[&str] = &["PNEUMONIA", "NORMAL"];
const BRAIN_TUMOR_LABELS: &[&str] = &["glioma", "meningioma", "notumor", "pituitary"];
const SKIN_CANCER_LABELS: &[&str] = &["Benign", "Malignant"];
const BONE_FRACTURE_LABELS: &[&str] = &["fractured", "not fractured"];

/// Fixed label list and mode per diagnosable modality. Label order matches
/// the model's output order; for binary models index 1 is the positive class.
pub fn specialist_layout(
    modality: ModalityLabel,
) -> Option<(&'static [&'static str], ClassificationMode)> {
    let layout = match modality {
        ModalityLabel::ChestXray => (CHEST_XRAY_LABELS, ClassificationMode::Binary),
        ModalityLabel::BrainTumor => (BRAIN_TUMOR_LABELS, ClassificationMode::Multiclass),
        ModalityLabel::SkinCancer => (SKIN_CANCER_LABELS, ClassificationMode::Binary),
        ModalityLabel::BoneFracture => (BONE_FRACTURE_LABELS, ClassificationMode::Binary),
        ModalityLabel::Other => return None,
    };
    Some(layout)
}

/// Immutable modality → specialist mapping.
pub struct SpecialistTable {
    entries: HashMap<ModalityLabel, SpecialistEntry>,
}

impl SpecialistTable {
    /// Build the standard table from one model per diagnosable modality.
    ///
    /// Models for `Other` are ignored; a missing modality is an error.
    pub fn standard(
        mut models: HashMap<ModalityLabel, Arc<dyn ClassifierModel>>,
    ) -> Result<Self, String> {
        let mut entries = HashMap::new();
        for modality in ModalityLabel::DIAGNOSABLE {
            let model = models
                .remove(&modality)
                .ok_or_else(|| format!("no specialist model for {modality}"))?;
            let (labels, mode) = specialist_layout(modality)
                .ok_or_else(|| format!("no specialist layout for {modality}"))?;
            let spec = InputSpec::for_specialist(modality)
                .ok_or_else(|| format!("no input spec for {modality}"))?;
            entries.insert(
                modality,
                SpecialistEntry {
                    modality,
                    model,
                    labels: labels.iter().map(|l| l.to_string()).collect(),
                    preprocessor: Arc::new(FixedShapePreprocessor::new(spec)),
                    mode,
                },
            );
        }
        Ok(Self { entries })
    }

    /// Build from explicit entries (custom layouts, test doubles).
    pub fn from_entries(entries: Vec<SpecialistEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.modality, e)).collect(),
        }
    }

    pub fn get(&self, modality: ModalityLabel) -> Option<&SpecialistEntry> {
        self.entries.get(&modality)
    }

    pub fn modalities(&self) -> Vec<ModalityLabel> {
        ModalityLabel::GATEKEEPER_ORDER
            .into_iter()
            .filter(|m| self.entries.contains_key(m))
            .collect()
    }
}
