//! Screening result types.

use image::GenericImageView;
use serde::{Deserialize, Serialize};

use super::{EnsembleVerdict, Label, ModalityPrediction};

/// Complete screening report for a single image.
///
/// Per-modality fields are `None` when that modality was unavailable
/// (eye region not found or classifier not loaded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    /// Path to the screened image.
    pub path: String,
    /// Timestamp of screening (ISO 8601).
    pub timestamp: String,
    /// Image dimensions.
    pub dimensions: ImageDimensions,
    /// Face classifier label.
    pub face_label: Option<Label>,
    /// Face classifier confidence.
    pub face_confidence: Option<f32>,
    /// Eye classifier label.
    pub eye_label: Option<Label>,
    /// Eye classifier confidence.
    pub eye_confidence: Option<f32>,
    /// Ensemble label.
    pub final_label: Label,
    /// Ensemble confidence.
    pub final_confidence: f32,
}

/// Outcome of the screening pipeline before it is stamped with a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screening {
    /// Face modality prediction, if the face classifier is loaded.
    pub face: Option<ModalityPrediction>,
    /// Eye modality prediction, if an eye was found and the classifier is loaded.
    pub eye: Option<ModalityPrediction>,
    /// Ensemble verdict.
    pub verdict: EnsembleVerdict,
}

impl ScreeningReport {
    /// Builds a report from a pipeline outcome.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        timestamp: impl Into<String>,
        dimensions: ImageDimensions,
        screening: &Screening,
    ) -> Self {
        Self {
            path: path.into(),
            timestamp: timestamp.into(),
            dimensions,
            face_label: screening.face.map(|p| p.label),
            face_confidence: screening.face.map(|p| p.confidence),
            eye_label: screening.eye.map(|p| p.label),
            eye_confidence: screening.eye.map(|p| p.confidence),
            final_label: screening.verdict.label,
            final_confidence: screening.verdict.confidence,
        }
    }
}

/// Record emitted for an input that was rejected or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionReport {
    /// Path to the rejected image.
    pub path: String,
    /// Machine-readable rejection class.
    pub kind: String,
    /// Human-readable reason.
    pub error: String,
}

/// Image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageDimensions {
    /// Creates new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Decoded image together with where it came from.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Path to the image file.
    pub path: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Decoded image data.
    pub image: image::DynamicImage,
}

impl ImageInfo {
    /// Wraps a decoded image.
    #[must_use]
    pub fn new(path: impl Into<String>, image: image::DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            path: path.into(),
            width,
            height,
            image,
        }
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.width, self.height)
    }
}
