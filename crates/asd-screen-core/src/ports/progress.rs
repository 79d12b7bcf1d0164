//! Progress reporting port for UI integration.

use crate::domain::ScreeningReport;
use crate::training::{EpochMetrics, Stage};

/// Events emitted during screening and training.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Screening started for an image.
    Started {
        /// Path to the image.
        path: String,
        /// Index in the batch (0-based).
        index: usize,
        /// Total images in batch, if known.
        total: Option<usize>,
    },
    /// Screening completed for an image.
    Completed {
        /// The screening report.
        report: ScreeningReport,
    },
    /// An image was rejected or failed.
    Rejected {
        /// Path to the image.
        path: String,
        /// Reason for rejection.
        reason: String,
    },
    /// All images have been processed.
    Finished {
        /// Images screened successfully.
        processed: usize,
        /// Images rejected.
        rejected: usize,
    },
    /// A training stage started.
    StageStarted {
        /// Model being trained.
        model: String,
        /// Stage entered.
        stage: Stage,
        /// Epoch budget of the stage.
        epochs: usize,
        /// Optimizer learning rate.
        learning_rate: f64,
    },
    /// A training epoch finished.
    EpochCompleted {
        /// Model being trained.
        model: String,
        /// Current stage.
        stage: Stage,
        /// Epoch index within the stage (0-based).
        epoch: usize,
        /// Training metrics.
        train: EpochMetrics,
        /// Validation metrics.
        valid: EpochMetrics,
    },
    /// The best checkpoint was scored on the evaluation stream.
    Evaluated {
        /// Model evaluated.
        model: String,
        /// Evaluation metrics.
        metrics: EpochMetrics,
    },
}

/// Port for receiving progress events.
pub trait ProgressSink: Send + Sync {
    /// Called when a progress event occurs.
    fn on_event(&self, event: ProgressEvent);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_event(&self, _event: ProgressEvent) {}
}
