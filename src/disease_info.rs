//! Static disease information table.
//!
//! Loaded once from JSON at startup. Keys are lowercase disease names; a
//! lookup miss is not an error and yields an entry with empty lists.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiseaseInfoError {
    #[error("Cannot read disease info {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid disease info JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Supplementary findings and recommendations for one disease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseInfo {
    #[serde(default)]
    pub key_findings: Vec<String>,
    #[serde(default)]
    pub recommendation: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DiseaseInfoTable {
    entries: HashMap<String, DiseaseInfo>,
}

impl DiseaseInfoTable {
    pub fn from_json(json: &str) -> Result<Self, DiseaseInfoError> {
        let raw: HashMap<String, DiseaseInfo> = serde_json::from_str(json)?;
        // Normalise keys so lookups stay case-insensitive even if the file isn't.
        let entries = raw
            .into_iter()
            .map(|(name, info)| (name.to_lowercase(), info))
            .collect();
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, DiseaseInfoError> {
        let json = std::fs::read_to_string(path).map_err(|source| DiseaseInfoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            entries = table.len(),
            "Disease info table loaded"
        );
        Ok(table)
    }

    /// Case-insensitive lookup. Unknown labels get empty lists.
    pub fn lookup(&self, label: &str) -> DiseaseInfo {
        self.entries
            .get(&label.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
