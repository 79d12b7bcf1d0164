//! Model directory layout.
//!
//! Classifier weights are produced by `asd-screen train`; the landmark
//! detector weights are placed here by hand.

use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Model metadata.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name/identifier.
    pub name: &'static str,
    /// Filename in models directory.
    pub filename: &'static str,
    /// What the model does.
    pub description: &'static str,
}

/// Landmark detector.
pub const BLAZEFACE: &str = "blazeface";
/// Whole-face classifier.
pub const FACE_CLASSIFIER: &str = "face_classifier";
/// Eye-region classifier.
pub const EYE_CLASSIFIER: &str = "eye_classifier";

/// Known models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: BLAZEFACE,
        filename: "blazeface.safetensors",
        description: "face detector and landmark provider",
    },
    ModelInfo {
        name: FACE_CLASSIFIER,
        filename: "face_classifier.safetensors",
        description: "whole-face binary classifier",
    },
    ModelInfo {
        name: EYE_CLASSIFIER,
        filename: "eye_classifier.safetensors",
        description: "eye-region binary classifier",
    },
];

static MODELS_DIR_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

/// Overrides the models directory for this process. `None` restores the default.
pub fn set_models_dir(dir: Option<PathBuf>) {
    if let Some(dir) = &dir {
        debug!("Models directory set to {}", dir.display());
    }
    *MODELS_DIR_OVERRIDE
        .write()
        .unwrap_or_else(PoisonError::into_inner) = dir;
}

/// Default models directory: `XDG_DATA_HOME/asd-screen/models` or
/// `~/.local/share/asd-screen/models`.
#[must_use]
pub fn default_models_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("asd-screen")
        .join("models")
}

/// Returns the models directory path, honoring any override.
#[must_use]
pub fn models_dir() -> PathBuf {
    MODELS_DIR_OVERRIDE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_else(default_models_dir)
}

/// Returns the path to a specific model file.
#[must_use]
pub fn model_path(name: &str) -> Option<PathBuf> {
    MODELS
        .iter()
        .find(|m| m.name == name)
        .map(|m| models_dir().join(m.filename))
}

/// Installation status of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelStatus {
    /// Model name.
    pub name: &'static str,
    /// Expected file location.
    pub path: PathBuf,
    /// True if the file exists.
    pub installed: bool,
}

/// Lists every known model with its status.
#[must_use]
pub fn list_models() -> Vec<ModelStatus> {
    let dir = models_dir();
    MODELS
        .iter()
        .map(|m| {
            let path = dir.join(m.filename);
            ModelStatus {
                name: m.name,
                installed: path.exists(),
                path,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        assert!(default_models_dir().ends_with("asd-screen/models"));
    }

    #[test]
    fn test_model_path() {
        let path = model_path(FACE_CLASSIFIER).unwrap_or_else(|| panic!("should have path"));
        assert!(path.ends_with("face_classifier.safetensors"));
    }

    #[test]
    fn test_model_path_unknown() {
        assert!(model_path("unknown").is_none());
    }

    #[test]
    fn test_override_and_listing() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        std::fs::write(dir.path().join("eye_classifier.safetensors"), b"x")
            .unwrap_or_else(|e| panic!("write: {e}"));

        set_models_dir(Some(dir.path().to_path_buf()));
        let listed = list_models();
        set_models_dir(None);

        let installed: Vec<_> = listed.iter().filter(|m| m.installed).map(|m| m.name).collect();
        assert_eq!(installed, [EYE_CLASSIFIER]);
        assert!(listed.iter().all(|m| m.path.starts_with(dir.path())));
    }
}
