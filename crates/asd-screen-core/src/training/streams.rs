//! Face and derived eye training streams.
//!
//! The eye stream never samples on its own: each eye batch is made by
//! pulling exactly one batch from a face-image stream it owns and mapping
//! every image through the eye locator. Labels pass through untouched, so
//! both streams stay aligned without any shared cursor.

use anyhow::Result;
use tracing::debug;

use crate::ports::{BatchStream, LabeledImageSource};
use crate::region::EyeLocator;

use super::{steps_per_epoch, LabeledBatch};

/// Pull-based adapter turning face batches into eye batches.
///
/// An image whose eye cannot be extracted is replaced by a whole-image
/// resize so training never stalls on a missing landmark.
pub struct EyeBatches<I> {
    source: I,
    eyes: EyeLocator,
}

impl<I> EyeBatches<I> {
    /// Wraps a face batch iterator.
    pub const fn new(source: I, eyes: EyeLocator) -> Self {
        Self { source, eyes }
    }
}

impl<I> Iterator for EyeBatches<I>
where
    I: Iterator<Item = Result<LabeledBatch>>,
{
    type Item = Result<LabeledBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = match self.source.next()? {
            Ok(batch) => batch,
            Err(e) => return Some(Err(e)),
        };

        let LabeledBatch { images, labels } = batch;
        let eyes = images
            .iter()
            .map(|image| self.eyes.eye_or_whole(image))
            .collect();

        Some(Ok(LabeledBatch::new(eyes, labels)))
    }
}

/// A batch stream with the number of steps that make one epoch.
pub struct Feed<'a> {
    /// The infinite batch stream.
    pub batches: BatchStream<'a>,
    /// Samples per epoch.
    pub samples: usize,
    /// Batch size the stream was built with.
    pub batch_size: usize,
    /// `ceil(samples / batch_size)`.
    pub steps: usize,
}

impl<'a> Feed<'a> {
    /// Wraps an existing stream.
    #[must_use]
    pub fn new(batches: BatchStream<'a>, samples: usize, batch_size: usize) -> Self {
        Self {
            batches,
            samples,
            batch_size,
            steps: steps_per_epoch(samples, batch_size),
        }
    }

    /// Face-image stream over `source`.
    #[must_use]
    pub fn face(source: &'a dyn LabeledImageSource, batch_size: usize) -> Self {
        Self::new(source.batches(batch_size), source.sample_count(), batch_size)
    }

    /// Eye stream derived from a face-image stream over `source`.
    #[must_use]
    pub fn eye(source: &'a dyn LabeledImageSource, batch_size: usize, eyes: EyeLocator) -> Self {
        let derived = EyeBatches::new(source.batches(batch_size), eyes);
        Self::new(Box::new(derived), source.sample_count(), batch_size)
    }

    /// Pulls the next batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream fails or ends.
    pub fn next_batch(&mut self) -> Result<LabeledBatch> {
        self.batches
            .next()
            .unwrap_or_else(|| Err(anyhow::anyhow!("batch stream ended unexpectedly")))
    }
}

impl std::fmt::Debug for Feed<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("samples", &self.samples)
            .field("batch_size", &self.batch_size)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

/// Face and eye streams over the same samples.
///
/// Both see every sample once per epoch in the same order; they differ in
/// batch size and therefore in steps per epoch.
#[derive(Debug)]
pub struct TrainingStreamPair<'a> {
    /// Face stream, batch size `B_f`.
    pub face: Feed<'a>,
    /// Eye stream, batch size `B_e`.
    pub eye: Feed<'a>,
}

impl<'a> TrainingStreamPair<'a> {
    /// Builds both streams over `source`.
    #[must_use]
    pub fn new(
        source: &'a dyn LabeledImageSource,
        face_batch_size: usize,
        eye_batch_size: usize,
        eyes: EyeLocator,
    ) -> Self {
        let face = Feed::face(source, face_batch_size);
        let eye = Feed::eye(source, eye_batch_size, eyes);
        debug!(
            "Stream pair over {} samples: face {} steps, eye {} steps",
            source.sample_count(),
            face.steps,
            eye.steps
        );
        Self { face, eye }
    }
}

/// Train, validation and evaluation feeds for one classifier.
#[derive(Debug)]
pub struct ModalityFeeds<'a> {
    /// Augmented, shuffled training stream.
    pub train: Feed<'a>,
    /// Validation stream.
    pub valid: Feed<'a>,
    /// Held-out, non-shuffled evaluation stream.
    pub test: Feed<'a>,
}
