//! Per-modality predictions and the ensemble verdict.

use serde::{Deserialize, Serialize};

/// Probability at or above which a prediction is labeled autistic.
pub const DECISION_THRESHOLD: f32 = 0.5;

/// Screening label.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    /// Positive class.
    Autistic,
    /// Negative class.
    #[serde(rename = "Non-Autistic")]
    NonAutistic,
    /// No modality was available to decide.
    Unknown,
}

impl Label {
    /// Applies the decision threshold. The boundary belongs to `Autistic`.
    #[must_use]
    pub fn from_probability(probability: f32) -> Self {
        if probability >= DECISION_THRESHOLD {
            Self::Autistic
        } else {
            Self::NonAutistic
        }
    }

    /// Display string used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Autistic => "Autistic",
            Self::NonAutistic => "Non-Autistic",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence of a thresholded probability: its distance toward the
/// chosen side, always in `[0.5, 1.0]` for probabilities in `[0, 1]`.
#[must_use]
pub fn confidence_of(probability: f32) -> f32 {
    if probability >= DECISION_THRESHOLD {
        probability
    } else {
        1.0 - probability
    }
}

/// One of the two independent prediction paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Whole-face classifier.
    Face,
    /// Eye-region classifier.
    Eye,
}

impl Modality {
    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Eye => "eye",
        }
    }
}

/// Output of a single classifier invocation on one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalityPrediction {
    /// Raw probability of the positive class.
    pub probability: f32,
    /// Thresholded label.
    pub label: Label,
    /// Confidence in `[0.5, 1.0]`.
    pub confidence: f32,
}

impl ModalityPrediction {
    /// Builds a prediction from a classifier probability.
    #[must_use]
    pub fn from_probability(probability: f32) -> Self {
        Self {
            probability,
            label: Label::from_probability(probability),
            confidence: confidence_of(probability),
        }
    }
}

/// Final decision over all available modalities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleVerdict {
    /// Final label.
    pub label: Label,
    /// Final confidence; `0.0` only for the `Unknown` sentinel.
    pub confidence: f32,
}

impl EnsembleVerdict {
    /// Sentinel verdict when no modality produced a probability.
    pub const UNKNOWN: Self = Self {
        label: Label::Unknown,
        confidence: 0.0,
    };
}
