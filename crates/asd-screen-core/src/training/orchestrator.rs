//! Two-stage training with early stopping and best-checkpoint evaluation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ports::{ProgressEvent, ProgressSink};

use super::batch::MetricsAccumulator;
use super::callbacks::{BestCheckpoint, EarlyStopping};
use super::streams::{Feed, ModalityFeeds};
use super::{BatchMetrics, EpochMetrics, LabeledBatch};

/// Training stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Backbone frozen, only the head learns.
    FrozenBackbone,
    /// Whole network learns at a reduced rate.
    FineTune,
}

impl Stage {
    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FrozenBackbone => "frozen-backbone",
            Self::FineTune => "fine-tune",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a classifier is in its training lifecycle. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    /// Stage 1 in progress.
    FrozenBackbone,
    /// Stage 2 in progress.
    FineTune,
    /// Best checkpoint scored on the evaluation stream.
    Evaluated,
}

impl TrainingState {
    /// The following state, or `None` once evaluated.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::FrozenBackbone => Some(Self::FineTune),
            Self::FineTune => Some(Self::Evaluated),
            Self::Evaluated => None,
        }
    }
}

impl From<Stage> for TrainingState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::FrozenBackbone => Self::FrozenBackbone,
            Stage::FineTune => Self::FineTune,
        }
    }
}

/// A model the orchestrator can drive through both stages.
pub trait StagedModel {
    /// In-memory copy of the weights.
    type Snapshot;

    /// Name used in logs, events and reports.
    fn name(&self) -> &str;

    /// Prepares for `stage`: sets trainable parameters and builds a fresh
    /// optimizer at `learning_rate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the optimizer cannot be built.
    fn configure(&mut self, stage: Stage, learning_rate: f64) -> Result<()>;

    /// Runs one optimizer step on `batch`.
    ///
    /// # Errors
    ///
    /// Returns an error on a failed forward or backward pass.
    fn train_batch(&mut self, batch: &LabeledBatch) -> Result<BatchMetrics>;

    /// Scores `batch` without updating weights.
    ///
    /// # Errors
    ///
    /// Returns an error on a failed forward pass.
    fn evaluate_batch(&self, batch: &LabeledBatch) -> Result<BatchMetrics>;

    /// Copies the current weights.
    ///
    /// # Errors
    ///
    /// Returns an error if tensors cannot be copied.
    fn snapshot(&self) -> Result<Self::Snapshot>;

    /// Restores weights from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot does not match the model.
    fn restore(&mut self, snapshot: Self::Snapshot) -> Result<()>;

    /// Writes the weights to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    fn save(&self, path: &Path) -> Result<()>;

    /// Reads the weights from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or mismatched tensors.
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// Epoch budgets and learning rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingPlan {
    /// Epochs with the backbone frozen.
    pub stage1_epochs: usize,
    /// Fine-tuning epochs.
    pub stage2_epochs: usize,
    /// Non-improving epochs tolerated per stage.
    pub patience: usize,
    /// Stage 1 learning rate.
    pub learning_rate: f64,
    /// Stage 2 runs at `learning_rate / fine_tune_divisor`.
    pub fine_tune_divisor: f64,
}

impl Default for TrainingPlan {
    fn default() -> Self {
        Self {
            stage1_epochs: 6,
            stage2_epochs: 14,
            patience: 6,
            learning_rate: 1e-4,
            fine_tune_divisor: 10.0,
        }
    }
}

impl TrainingPlan {
    /// Stages in order with their epoch budget and learning rate.
    #[must_use]
    pub fn stages(&self) -> [(Stage, usize, f64); 2] {
        [
            (Stage::FrozenBackbone, self.stage1_epochs, self.learning_rate),
            (
                Stage::FineTune,
                self.stage2_epochs,
                self.learning_rate / self.fine_tune_divisor,
            ),
        ]
    }
}

/// Metrics for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Training pass.
    pub train: EpochMetrics,
    /// Validation pass.
    pub valid: EpochMetrics,
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage.
    pub stage: Stage,
    /// Learning rate used.
    pub learning_rate: f64,
    /// Epochs actually run.
    pub epochs_run: usize,
    /// True if early stopping ended the stage.
    pub stopped_early: bool,
    /// Best validation loss within the stage.
    pub best_val_loss: Option<f64>,
    /// Per-epoch metrics.
    pub history: Vec<EpochRecord>,
}

/// Outcome of a full training run for one classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Model name.
    pub model: String,
    /// Final lifecycle state.
    pub state: TrainingState,
    /// Per-stage outcomes in order.
    pub stages: Vec<StageReport>,
    /// Training steps per epoch.
    pub steps_per_epoch: usize,
    /// Best validation accuracy over both stages.
    pub best_val_accuracy: Option<f64>,
    /// Checkpoint path, if one was written.
    pub checkpoint: Option<PathBuf>,
    /// Metrics of the evaluated model on the held-out stream.
    pub test: EpochMetrics,
}

/// Drives a [`StagedModel`] through both stages and the final evaluation.
pub struct Orchestrator<'a> {
    plan: TrainingPlan,
    progress: &'a dyn ProgressSink,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(plan: TrainingPlan, progress: &'a dyn ProgressSink) -> Self {
        Self { plan, progress }
    }

    /// The plan in use.
    #[must_use]
    pub const fn plan(&self) -> &TrainingPlan {
        &self.plan
    }

    /// Trains `model` and evaluates its best checkpoint.
    ///
    /// The checkpoint at `checkpoint` tracks best validation accuracy across
    /// both stages. Early stopping tracks validation loss and is reset for
    /// each stage. After the last stage the checkpoint is reloaded before
    /// evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error if any step, save or load fails.
    pub fn run<M: StagedModel>(
        &self,
        model: &mut M,
        feeds: &mut ModalityFeeds<'_>,
        checkpoint: &Path,
    ) -> Result<TrainingReport> {
        let name = model.name().to_string();
        let mut best = BestCheckpoint::new(checkpoint);
        let mut stages = Vec::with_capacity(2);
        let mut state = TrainingState::FrozenBackbone;

        info!(
            "Training {name}: {} samples, {} steps per epoch",
            feeds.train.samples, feeds.train.steps
        );

        for (stage, epochs, learning_rate) in self.plan.stages() {
            state = TrainingState::from(stage);
            let report = self.run_stage(model, feeds, &mut best, stage, epochs, learning_rate)?;
            stages.push(report);
        }

        if best.has_saved() {
            debug!("Reloading best checkpoint from {}", best.path().display());
            model
                .load(best.path())
                .with_context(|| format!("Failed to reload {}", best.path().display()))?;
        } else {
            warn!("No checkpoint written for {name}; evaluating current weights");
        }

        let test = evaluate(model, &mut feeds.test)?;
        if let Some(next) = state.next() {
            state = next;
        }
        info!(
            "Evaluated {name}: loss {:.4}, accuracy {:.4}",
            test.loss, test.accuracy
        );
        self.progress.on_event(ProgressEvent::Evaluated {
            model: name.clone(),
            metrics: test,
        });

        Ok(TrainingReport {
            model: name,
            state,
            stages,
            steps_per_epoch: feeds.train.steps,
            best_val_accuracy: best.best(),
            checkpoint: best.has_saved().then(|| best.path().to_path_buf()),
            test,
        })
    }

    fn run_stage<M: StagedModel>(
        &self,
        model: &mut M,
        feeds: &mut ModalityFeeds<'_>,
        best: &mut BestCheckpoint,
        stage: Stage,
        epochs: usize,
        learning_rate: f64,
    ) -> Result<StageReport> {
        let name = model.name().to_string();
        model.configure(stage, learning_rate)?;
        info!("{name}: {stage} stage, {epochs} epochs at lr {learning_rate:e}");
        self.progress.on_event(ProgressEvent::StageStarted {
            model: name.clone(),
            stage,
            epochs,
            learning_rate,
        });

        let mut stopper = EarlyStopping::new(self.plan.patience);
        let mut history = Vec::with_capacity(epochs);
        let mut stopped_early = false;

        for epoch in 0..epochs {
            let train = train_epoch(model, &mut feeds.train)?;
            let valid = evaluate(model, &mut feeds.valid)?;
            debug!(
                "{name} {stage} epoch {}: loss {:.4} acc {:.4} | val_loss {:.4} val_acc {:.4}",
                epoch + 1,
                train.loss,
                train.accuracy,
                valid.loss,
                valid.accuracy
            );
            history.push(EpochRecord { train, valid });
            self.progress.on_event(ProgressEvent::EpochCompleted {
                model: name.clone(),
                stage,
                epoch,
                train,
                valid,
            });

            if best.observe(valid.accuracy) {
                model
                    .save(best.path())
                    .with_context(|| format!("Failed to write {}", best.path().display()))?;
                debug!("{name}: val_accuracy improved to {:.4}", valid.accuracy);
            }

            if stopper.observe(epoch, valid.loss, || model.snapshot())? {
                info!("{name}: early stop in {stage} stage after {} epochs", epoch + 1);
                stopped_early = true;
                break;
            }
        }

        if stopped_early {
            if let Some(snapshot) = stopper.take_best() {
                model.restore(snapshot)?;
            }
        }

        Ok(StageReport {
            stage,
            learning_rate,
            epochs_run: history.len(),
            stopped_early,
            best_val_loss: stopper.best_loss(),
            history,
        })
    }
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

fn train_epoch<M: StagedModel>(model: &mut M, feed: &mut Feed<'_>) -> Result<EpochMetrics> {
    let mut acc = MetricsAccumulator::default();
    for _ in 0..feed.steps {
        let batch = feed.next_batch()?;
        acc.add(model.train_batch(&batch)?);
    }
    Ok(acc.finish())
}

/// Scores one epoch of `feed` without training.
///
/// # Errors
///
/// Returns an error if the stream or a forward pass fails.
pub fn evaluate<M: StagedModel>(model: &M, feed: &mut Feed<'_>) -> Result<EpochMetrics> {
    let mut acc = MetricsAccumulator::default();
    for _ in 0..feed.steps {
        let batch = feed.next_batch()?;
        acc.add(model.evaluate_batch(&batch)?);
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let plan = TrainingPlan::default();
        let [(s1, e1, lr1), (s2, e2, lr2)] = plan.stages();
        assert_eq!((s1, e1), (Stage::FrozenBackbone, 6));
        assert_eq!((s2, e2), (Stage::FineTune, 14));
        assert!((lr1 - 1e-4).abs() < f64::EPSILON);
        assert!((lr2 - 1e-5).abs() < 1e-12);
    }

    #[test]
    fn test_state_moves_forward() {
        let mut state = TrainingState::FrozenBackbone;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            seen.push(state);
        }
        assert_eq!(
            seen,
            [
                TrainingState::FrozenBackbone,
                TrainingState::FineTune,
                TrainingState::Evaluated
            ]
        );
    }
}
