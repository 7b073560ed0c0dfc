//! Shared handler state and response payloads.

use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::pipeline::orchestrator::{
    LOW_CONFIDENCE_FINDING, LOW_CONFIDENCE_RECOMMENDATION,
};
use crate::pipeline::{DiagnosisPipeline, Outcome};

pub const REJECTION_MESSAGE: &str = "Image Type Not Supported";
pub const LOW_CONFIDENCE_WARNING: &str = "Low Confidence Prediction";

/// State handed to every handler via `State<ApiContext>`.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<DiagnosisPipeline>,
    pub config: Arc<AppConfig>,
}

impl ApiContext {
    pub fn new(pipeline: DiagnosisPipeline, config: AppConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

/// Body of a successful `POST /predict`.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PredictResponse {
    Rejection {
        rejection: bool,
        message: &'static str,
    },
    LowConfidence {
        warning: &'static str,
        predicted_disease: String,
        confidence_score: f64,
        key_findings: Vec<String>,
        recommendation: Vec<String>,
    },
    Diagnosis {
        predicted_disease: String,
        confidence_score: f64,
        key_findings: Vec<String>,
        recommendation: Vec<String>,
    },
}

impl From<Outcome> for PredictResponse {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Rejected => PredictResponse::Rejection {
                rejection: true,
                message: REJECTION_MESSAGE,
            },
            Outcome::LowConfidence {
                predicted_disease,
                confidence_score,
            } => PredictResponse::LowConfidence {
                warning: LOW_CONFIDENCE_WARNING,
                predicted_disease,
                confidence_score,
                key_findings: vec![LOW_CONFIDENCE_FINDING.to_string()],
                recommendation: vec![LOW_CONFIDENCE_RECOMMENDATION.to_string()],
            },
            Outcome::Diagnosed {
                predicted_disease,
                confidence_score,
                key_findings,
                recommendation,
            } => PredictResponse::Diagnosis {
                predicted_disease,
                confidence_score,
                key_findings,
                recommendation,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_shape() {
        let json = serde_json::to_value(PredictResponse::from(Outcome::Rejected)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rejection": true, "message": "Image Type Not Supported"})
        );
    }

    #[test]
    fn low_confidence_carries_advisory() {
        let response = PredictResponse::from(Outcome::LowConfidence {
            predicted_disease: "Glioma".into(),
            confidence_score: 60.5,
        });
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["warning"], "Low Confidence Prediction");
        assert_eq!(json["predicted_disease"], "Glioma");
        assert_eq!(json["confidence_score"], 60.5);
        assert_eq!(json["key_findings"][0], LOW_CONFIDENCE_FINDING);
        assert_eq!(json["recommendation"][0], LOW_CONFIDENCE_RECOMMENDATION);
    }

    #[test]
    fn diagnosis_has_no_warning_key() {
        let response = PredictResponse::from(Outcome::Diagnosed {
            predicted_disease: "Pneumonia".into(),
            confidence_score: 91.0,
            key_findings: vec!["Opacity".into()],
            recommendation: vec!["See a doctor".into()],
        });
        let json = serde_json::to_value(response).unwrap();
        assert!(json.get("warning").is_none());
        assert!(json.get("rejection").is_none());
        assert_eq!(json["key_findings"], serde_json::json!(["Opacity"]));
    }
}
