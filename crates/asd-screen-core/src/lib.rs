//! ASD Screen Core - domain logic for face and eye based screening
//!
//! This crate holds the domain types, ports, the eye-region extractor, the
//! face-count gate, the ensemble decision, the screening pipeline, and the
//! two-stage training orchestrator with its derived eye stream. Candle
//! implementations of the models live in [`inference`].

pub mod domain;
pub mod ensemble;
pub mod gate;
pub mod inference;
pub mod ports;
pub mod region;
pub mod screening;
pub mod training;

pub use domain::{
    EnsembleVerdict, ImageInfo, Label, LandmarkSet, Modality, ModalityPrediction, Point2,
    RejectionReport, Screening, ScreeningError, ScreeningReport, TrainingError,
};
pub use ports::{
    Classifier, ImageSource, LabeledImageSource, LandmarkProvider, ProgressEvent, ProgressSink,
    ReportOutput,
};
pub use region::{EyeLocator, EyeRegions, Extraction, ExtractorConfig, RegionExtractor};
pub use screening::{Screener, ScreenerConfig};
pub use training::{Orchestrator, StagedModel, TrainingPlan, TrainingReport};
