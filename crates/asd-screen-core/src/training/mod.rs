//! Two-stage training of the face and eye classifiers.

mod batch;
mod callbacks;
mod orchestrator;
mod streams;

pub use batch::{steps_per_epoch, BatchMetrics, EpochMetrics, LabeledBatch};
pub use callbacks::{BestCheckpoint, EarlyStopping};
pub use orchestrator::{
    evaluate, EpochRecord, Orchestrator, Stage, StageReport, StagedModel, TrainingPlan,
    TrainingReport, TrainingState,
};
pub use streams::{EyeBatches, Feed, ModalityFeeds, TrainingStreamPair};
