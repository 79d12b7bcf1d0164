//! Error taxonomy for screening and training.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single screening request.
///
/// Variants split into input rejections (the caller sent something the
/// pipeline cannot screen) and runtime faults.
#[derive(Debug, Error)]
pub enum ScreeningError {
    /// No face in the image.
    #[error("No face detected. Please upload a clear face photo.")]
    NoFace,

    /// More than one face in the image.
    #[error("Multiple faces detected ({0}). Please upload a photo with a single face.")]
    MultipleFaces(usize),

    /// The upload could not be decoded.
    #[error("Could not read image: {0}")]
    UnreadableImage(String),

    /// The landmark detector failed.
    #[error("Landmark detection failed: {0:#}")]
    Detector(anyhow::Error),

    /// A loaded classifier failed during inference.
    #[error("Classifier inference failed: {0:#}")]
    Classifier(anyhow::Error),
}

impl ScreeningError {
    /// True for input rejections, false for runtime faults.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NoFace | Self::MultipleFaces(_) | Self::UnreadableImage(_)
        )
    }

    /// Machine-readable class name.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NoFace => "no_face",
            Self::MultipleFaces(_) => "multiple_faces",
            Self::UnreadableImage(_) => "unreadable_image",
            Self::Detector(_) => "detector_failure",
            Self::Classifier(_) => "classifier_failure",
        }
    }
}

/// Fatal training startup faults.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// Dataset directory is missing.
    #[error("Dataset directory does not exist: {}", .0.display())]
    MissingDataset(PathBuf),

    /// Dataset directory has no usable images.
    #[error("No images found in dataset directory: {}", .0.display())]
    EmptyDataset(PathBuf),

    /// Binary training needs exactly two class directories.
    #[error("Expected 2 class directories in {}, found {found}: {classes:?}", .root.display())]
    ClassCount {
        /// Dataset root.
        root: PathBuf,
        /// Number of class directories found.
        found: usize,
        /// Their names.
        classes: Vec<String>,
    },

    /// The configured positive class is not one of the class directories.
    #[error("Positive class '{positive}' not among classes {classes:?}")]
    UnknownPositiveClass {
        /// Configured positive class.
        positive: String,
        /// Discovered classes.
        classes: Vec<String>,
    },

    /// A batch size of zero was requested.
    #[error("Batch size must be at least 1")]
    ZeroBatchSize,
}
