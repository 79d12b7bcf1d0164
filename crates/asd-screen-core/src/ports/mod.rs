//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the domain core and external adapters.

mod classifier;
mod dataset;
mod image_source;
mod landmark_provider;
mod progress;
mod result_output;

pub use classifier::Classifier;
pub use dataset::{BatchStream, LabeledImageSource};
pub use image_source::ImageSource;
pub use landmark_provider::LandmarkProvider;
pub use progress::{NoProgress, ProgressEvent, ProgressSink};
pub use result_output::ReportOutput;
