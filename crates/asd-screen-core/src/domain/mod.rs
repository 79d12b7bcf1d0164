//! Core domain types for screening and training.

mod error;
mod landmarks;
mod prediction;
mod result;

pub use error::{ScreeningError, TrainingError};
pub use landmarks::{CoordinateSpace, LandmarkSet, Point2};
pub use prediction::{
    confidence_of, EnsembleVerdict, Label, Modality, ModalityPrediction, DECISION_THRESHOLD,
};
pub use result::{ImageDimensions, ImageInfo, RejectionReport, Screening, ScreeningReport};
