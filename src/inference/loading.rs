//! Versioned model-loading configuration.
//!
//! The exported classifiers were trained with layers and initializers that
//! need a reconstruction policy when their graphs are rebuilt (extra
//! constructor arguments dropped, legacy layer names aliased). Instead of an
//! open-ended registry, the policy set is a fixed, versioned table and each
//! `ModelSpec` declares which components it needs. `ModelCatalog::validate`
//! runs before any file is opened so a mismatch fails startup, not a request.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::modality::ModalityLabel;

use super::{ClassifierModel, ModelError};

/// Current version of the component reconstruction table.
pub const LOADING_PROFILE_VERSION: u32 = 1;

/// How a serialized component is reconstructed at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconstructionPolicy {
    /// Rebuild the component, discarding constructor arguments it no longer accepts.
    DropExtraArgs,
    /// Rebuild as a different, current component.
    AliasTo(&'static str),
}

/// Fixed mapping from serialized-component name to reconstruction policy.
#[derive(Debug, Clone)]
pub struct LoadingProfile {
    pub version: u32,
    components: BTreeMap<&'static str, ReconstructionPolicy>,
}

impl LoadingProfile {
    /// The profile the shipped models were exported against.
    pub fn v1() -> Self {
        let components = BTreeMap::from([
            ("VarianceScaling", ReconstructionPolicy::DropExtraArgs),
            ("Zeros", ReconstructionPolicy::DropExtraArgs),
            ("Ones", ReconstructionPolicy::DropExtraArgs),
            ("GlorotUniform", ReconstructionPolicy::DropExtraArgs),
            ("GlorotNormal", ReconstructionPolicy::DropExtraArgs),
            (
                "BatchNormalizationV1",
                ReconstructionPolicy::AliasTo("BatchNormalization"),
            ),
        ]);
        Self {
            version: LOADING_PROFILE_VERSION,
            components,
        }
    }

    pub fn policy(&self, component: &str) -> Option<&ReconstructionPolicy> {
        self.components.get(component)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &&'static str> {
        self.components.keys()
    }
}

impl Default for LoadingProfile {
    fn default() -> Self {
        Self::v1()
    }
}

/// Which slot of the pipeline a model fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Gatekeeper,
    Specialist(ModalityLabel),
}

/// Static description of one model file.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub role: ModelRole,
    pub name: &'static str,
    pub file_name: &'static str,
    /// Profile version the file was exported against.
    pub profile_version: u32,
    /// Serialized components needing a reconstruction policy.
    pub components: &'static [&'static str],
}

impl ModelSpec {
    pub fn path_in(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.file_name)
    }
}

const SKIN_CANCER_COMPONENTS: &[&str] = &[
    "VarianceScaling",
    "Zeros",
    "Ones",
    "GlorotUniform",
    "GlorotNormal",
    "BatchNormalizationV1",
];

/// The five models the service runs.
pub fn default_specs() -> Vec<ModelSpec> {
    vec![
        ModelSpec {
            role: ModelRole::Gatekeeper,
            name: "gatekeeper",
            file_name: "gatekeeper_model.onnx",
            profile_version: LOADING_PROFILE_VERSION,
            components: &[],
        },
        ModelSpec {
            role: ModelRole::Specialist(ModalityLabel::ChestXray),
            name: "chest_xray",
            file_name: "chest_xray_model.onnx",
            profile_version: LOADING_PROFILE_VERSION,
            components: &[],
        },
        ModelSpec {
            role: ModelRole::Specialist(ModalityLabel::BrainTumor),
            name: "brain_tumor",
            file_name: "brain_tumor_xception_model.onnx",
            profile_version: LOADING_PROFILE_VERSION,
            components: &[],
        },
        ModelSpec {
            role: ModelRole::Specialist(ModalityLabel::SkinCancer),
            name: "skin_cancer",
            file_name: "resnet50_binary_softmax.onnx",
            profile_version: LOADING_PROFILE_VERSION,
            components: SKIN_CANCER_COMPONENTS,
        },
        ModelSpec {
            role: ModelRole::Specialist(ModalityLabel::BoneFracture),
            name: "bone_fracture",
            file_name: "fracture_classification_model.onnx",
            profile_version: LOADING_PROFILE_VERSION,
            components: &[],
        },
    ]
}

/// Models loaded at startup, keyed by pipeline slot.
pub struct LoadedModels {
    pub gatekeeper: Arc<dyn ClassifierModel>,
    pub specialists: HashMap<ModalityLabel, Arc<dyn ClassifierModel>>,
}

/// A loading profile plus the specs it must satisfy.
pub struct ModelCatalog {
    pub profile: LoadingProfile,
    pub specs: Vec<ModelSpec>,
}

impl ModelCatalog {
    pub fn new(profile: LoadingProfile, specs: Vec<ModelSpec>) -> Self {
        Self { profile, specs }
    }

    /// Check every spec against the profile and the slot layout.
    ///
    /// Requires exactly one gatekeeper, one specialist per diagnosable
    /// modality, a matching profile version, and a policy for every
    /// declared component.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut gatekeepers = 0;
        let mut seen = Vec::new();

        for spec in &self.specs {
            if spec.profile_version != self.profile.version {
                return Err(ModelError::Init(format!(
                    "{}: exported for loading profile v{}, runtime has v{}",
                    spec.name, spec.profile_version, self.profile.version
                )));
            }
            for component in spec.components {
                if self.profile.policy(component).is_none() {
                    return Err(ModelError::Init(format!(
                        "{}: no reconstruction policy for component '{component}'",
                        spec.name
                    )));
                }
            }
            match spec.role {
                ModelRole::Gatekeeper => gatekeepers += 1,
                ModelRole::Specialist(ModalityLabel::Other) => {
                    return Err(ModelError::Init(format!(
                        "{}: 'other' is not a diagnosable modality",
                        spec.name
                    )));
                }
                ModelRole::Specialist(modality) => {
                    if seen.contains(&modality) {
                        return Err(ModelError::Init(format!(
                            "duplicate specialist for {modality}"
                        )));
                    }
                    seen.push(modality);
                }
            }
        }

        if gatekeepers != 1 {
            return Err(ModelError::Init(format!(
                "expected exactly one gatekeeper model, found {gatekeepers}"
            )));
        }
        for modality in ModalityLabel::DIAGNOSABLE {
            if !seen.contains(&modality) {
                return Err(ModelError::Init(format!(
                    "no specialist model configured for {modality}"
                )));
            }
        }
        Ok(())
    }

    /// Validate, then load every spec from `models_dir` with `load`.
    pub fn load_with<F>(&self, models_dir: &Path, load: F) -> Result<LoadedModels, ModelError>
    where
        F: Fn(&ModelSpec, &Path) -> Result<Arc<dyn ClassifierModel>, ModelError>,
    {
        self.validate()?;

        let mut gatekeeper = None;
        let mut specialists = HashMap::new();

        for spec in &self.specs {
            let path = spec.path_in(models_dir);
            for component in spec.components {
                tracing::debug!(
                    model = spec.name,
                    component,
                    policy = ?self.profile.policy(component),
                    "Applying reconstruction policy"
                );
            }
            let model = load(spec, &path)?;
            tracing::info!(model = spec.name, path = %path.display(), "Model ready");
            match spec.role {
                ModelRole::Gatekeeper => gatekeeper = Some(model),
                ModelRole::Specialist(modality) => {
                    specialists.insert(modality, model);
                }
            }
        }

        let gatekeeper = gatekeeper
            .ok_or_else(|| ModelError::Init("gatekeeper model missing".to_string()))?;

        Ok(LoadedModels {
            gatekeeper,
            specialists,
        })
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(LoadingProfile::v1(), default_specs())
    }
}
