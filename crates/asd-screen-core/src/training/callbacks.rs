//! Early stopping and best-checkpoint tracking.

use std::path::{Path, PathBuf};

use anyhow::Result;

/// Stops a stage when validation loss stops improving.
///
/// Holds a snapshot of the weights from the best epoch so they can be
/// restored when the stage stops. One instance covers one stage.
#[derive(Debug)]
pub struct EarlyStopping<S> {
    patience: usize,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
    best_snapshot: Option<S>,
}

impl<S> EarlyStopping<S> {
    /// Creates a tracker that allows `patience` non-improving epochs.
    #[must_use]
    pub const fn new(patience: usize) -> Self {
        Self {
            patience,
            best: f64::INFINITY,
            best_epoch: None,
            wait: 0,
            best_snapshot: None,
        }
    }

    /// Records one epoch's validation loss. Returns `true` when the stage
    /// should stop.
    ///
    /// `snapshot` is only called when the weights need to be kept.
    ///
    /// # Errors
    ///
    /// Propagates snapshot failures.
    pub fn observe(
        &mut self,
        epoch: usize,
        val_loss: f64,
        snapshot: impl FnOnce() -> Result<S>,
    ) -> Result<bool> {
        self.wait += 1;

        if val_loss < self.best {
            self.best = val_loss;
            self.best_epoch = Some(epoch);
            self.best_snapshot = Some(snapshot()?);
            self.wait = 0;
            return Ok(false);
        }

        // NaN losses never improve; keep the first epoch's weights anyway.
        if self.best_snapshot.is_none() {
            self.best_snapshot = Some(snapshot()?);
            self.best_epoch = Some(epoch);
        }

        Ok(self.wait >= self.patience && epoch > 0)
    }

    /// Best validation loss seen, if any finite one was.
    #[must_use]
    pub fn best_loss(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }

    /// Epoch whose weights are held.
    #[must_use]
    pub const fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Takes the held snapshot.
    pub fn take_best(&mut self) -> Option<S> {
        self.best_snapshot.take()
    }
}

/// Tracks the best validation accuracy over the whole run.
///
/// Spans both stages; a save only happens on strict improvement.
#[derive(Debug, Clone)]
pub struct BestCheckpoint {
    path: PathBuf,
    best: f64,
    saves: usize,
}

impl BestCheckpoint {
    /// Creates a tracker writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            best: f64::NEG_INFINITY,
            saves: 0,
        }
    }

    /// Records one epoch's validation accuracy. Returns `true` if the model
    /// should be saved now.
    pub fn observe(&mut self, accuracy: f64) -> bool {
        if accuracy > self.best {
            self.best = accuracy;
            self.saves += 1;
            true
        } else {
            false
        }
    }

    /// Checkpoint location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best accuracy seen, if any epoch was observed.
    #[must_use]
    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }

    /// True once at least one checkpoint was written.
    #[must_use]
    pub const fn has_saved(&self) -> bool {
        self.saves > 0
    }

    /// Number of checkpoint writes.
    #[must_use]
    pub const fn saves(&self) -> usize {
        self.saves
    }
}
