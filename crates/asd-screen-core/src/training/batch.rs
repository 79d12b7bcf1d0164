//! Labeled batches and per-epoch bookkeeping.

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A batch of images with one binary label each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledBatch {
    /// Batch images, all of the stream's target size.
    pub images: Vec<RgbImage>,
    /// Labels aligned with `images`; `1.0` is the positive class.
    pub labels: Vec<f32>,
}

impl LabeledBatch {
    /// Creates a batch.
    #[must_use]
    pub fn new(images: Vec<RgbImage>, labels: Vec<f32>) -> Self {
        debug_assert_eq!(images.len(), labels.len(), "images and labels must align");
        Self { images, labels }
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True if the batch has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Optimizer steps needed to see every sample once: `ceil(samples / batch_size)`.
#[must_use]
pub const fn steps_per_epoch(samples: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        0
    } else {
        samples.div_ceil(batch_size)
    }
}

/// Loss and accuracy contribution of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchMetrics {
    /// Mean loss over the batch.
    pub loss: f64,
    /// Correctly classified samples.
    pub correct: usize,
    /// Samples in the batch.
    pub count: usize,
}

/// Sample-weighted metrics over one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Mean loss per sample.
    pub loss: f64,
    /// Fraction of correct samples.
    pub accuracy: f64,
    /// Samples seen.
    pub samples: usize,
    /// Batches seen.
    pub steps: usize,
}

/// Accumulates batch metrics into epoch metrics.
#[derive(Debug, Default)]
pub(crate) struct MetricsAccumulator {
    loss_sum: f64,
    correct: usize,
    count: usize,
    steps: usize,
}

impl MetricsAccumulator {
    pub(crate) fn add(&mut self, batch: BatchMetrics) {
        #[allow(clippy::cast_precision_loss)]
        let weight = batch.count as f64;
        self.loss_sum += batch.loss * weight;
        self.correct += batch.correct;
        self.count += batch.count;
        self.steps += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn finish(self) -> EpochMetrics {
        if self.count == 0 {
            return EpochMetrics {
                steps: self.steps,
                ..EpochMetrics::default()
            };
        }
        let n = self.count as f64;
        EpochMetrics {
            loss: self.loss_sum / n,
            accuracy: self.correct as f64 / n,
            samples: self.count,
            steps: self.steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_per_epoch() {
        assert_eq!(steps_per_epoch(1000, 16), 63);
        assert_eq!(steps_per_epoch(1000, 32), 32);
        assert_eq!(steps_per_epoch(1024, 32), 32);
        assert_eq!(steps_per_epoch(1, 32), 1);
        assert_eq!(steps_per_epoch(0, 32), 0);
        assert_eq!(steps_per_epoch(10, 0), 0);
    }

    #[test]
    fn test_metrics_are_sample_weighted() {
        let mut acc = MetricsAccumulator::default();
        acc.add(BatchMetrics {
            loss: 1.0,
            correct: 3,
            count: 4,
        });
        acc.add(BatchMetrics {
            loss: 0.0,
            correct: 0,
            count: 1,
        });
        let m = acc.finish();
        assert!((m.loss - 0.8).abs() < 1e-12);
        assert!((m.accuracy - 0.6).abs() < 1e-12);
        assert_eq!(m.samples, 5);
        assert_eq!(m.steps, 2);
    }
}
