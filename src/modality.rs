//! Image modality labels produced by the gatekeeper.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of image domains the gatekeeper can recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalityLabel {
    BrainTumor,
    ChestXray,
    SkinCancer,
    BoneFracture,
    Other,
}

impl ModalityLabel {
    /// Gatekeeper output order. Index `i` of the score vector scores `GATEKEEPER_ORDER[i]`.
    pub const GATEKEEPER_ORDER: [ModalityLabel; 5] = [
        ModalityLabel::BrainTumor,
        ModalityLabel::ChestXray,
        ModalityLabel::SkinCancer,
        ModalityLabel::BoneFracture,
        ModalityLabel::Other,
    ];

    /// Modalities that route to a specialist.
    pub const DIAGNOSABLE: [ModalityLabel; 4] = [
        ModalityLabel::BrainTumor,
        ModalityLabel::ChestXray,
        ModalityLabel::SkinCancer,
        ModalityLabel::BoneFracture,
    ];

    pub fn from_gatekeeper_index(index: usize) -> Option<Self> {
        Self::GATEKEEPER_ORDER.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModalityLabel::BrainTumor => "brain_tumor",
            ModalityLabel::ChestXray => "chest_xray",
            ModalityLabel::SkinCancer => "skin_cancer",
            ModalityLabel::BoneFracture => "bone_fracture",
            ModalityLabel::Other => "other",
        }
    }

    pub fn is_diagnosable(&self) -> bool {
        !matches!(self, ModalityLabel::Other)
    }
}

impl fmt::Display for ModalityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gatekeeper_order_is_fixed() {
        let names: Vec<_> = ModalityLabel::GATEKEEPER_ORDER
            .iter()
            .map(|m| m.as_str())
            .collect();
        assert_eq!(
            names,
            ["brain_tumor", "chest_xray", "skin_cancer", "bone_fracture", "other"]
        );
    }

    #[test]
    fn index_out_of_range_is_none() {
        assert_eq!(ModalityLabel::from_gatekeeper_index(4), Some(ModalityLabel::Other));
        assert_eq!(ModalityLabel::from_gatekeeper_index(5), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ModalityLabel::ChestXray).unwrap();
        assert_eq!(json, "\"chest_xray\"");
        let back: ModalityLabel = serde_json::from_str("\"bone_fracture\"").unwrap();
        assert_eq!(back, ModalityLabel::BoneFracture);
    }

    #[test]
    fn other_is_not_diagnosable() {
        assert!(!ModalityLabel::Other.is_diagnosable());
        assert!(ModalityLabel::DIAGNOSABLE.iter().all(|m| m.is_diagnosable()));
    }
}
