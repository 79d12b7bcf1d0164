//! Labeled training data port.

use crate::training::LabeledBatch;

/// Infinite stream of labeled batches.
pub type BatchStream<'a> = Box<dyn Iterator<Item = anyhow::Result<LabeledBatch>> + Send + 'a>;

/// Port for a labeled image collection consumed as batches.
///
/// Every stream returned by [`batches`](Self::batches) visits samples in the
/// same per-epoch order regardless of batch size, so two streams over one
/// source stay aligned sample-for-sample.
pub trait LabeledImageSource: Send + Sync {
    /// Number of samples in one epoch.
    fn sample_count(&self) -> usize;

    /// Starts a new infinite batch stream. The last batch of an epoch may
    /// be short; the next epoch starts a fresh batch.
    fn batches(&self, batch_size: usize) -> BatchStream<'_>;
}
