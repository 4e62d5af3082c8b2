//! Locations of the model artifact and feature names file.

use std::path::{Path, PathBuf};

pub const MODELS_DIR: &str = "models";
pub const MODEL_FILE: &str = "logistic_pipeline.json";
pub const FEATURES_FILE: &str = "feature_names.json";

/// Paths of the two startup artifacts.
///
/// Both default to `<project root>/models/`; either can be overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub features: PathBuf,
}

impl ArtifactPaths {
    pub fn from_project_root(root: &Path) -> Self {
        let models = root.join(MODELS_DIR);
        Self {
            model: models.join(MODEL_FILE),
            features: models.join(FEATURES_FILE),
        }
    }

    pub fn with_model(mut self, model: Option<PathBuf>) -> Self {
        if let Some(path) = model {
            self.model = path;
        }
        self
    }

    pub fn with_features(mut self, features: Option<PathBuf>) -> Self {
        if let Some(path) = features {
            self.features = path;
        }
        self
    }
}
