//! Mock implementations of core port traits.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use asd_screen_core::domain::LandmarkSet;
use asd_screen_core::ports::{
    BatchStream, Classifier, LabeledImageSource, LandmarkProvider, ProgressEvent, ProgressSink,
};
use asd_screen_core::training::{BatchMetrics, LabeledBatch, Stage, StagedModel};
use image::RgbImage;

/// Landmark provider returning the same faces for every image.
pub struct MockLandmarkProvider {
    faces: Vec<LandmarkSet>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockLandmarkProvider {
    /// Returns `faces` on every call.
    #[must_use]
    pub const fn new(faces: Vec<LandmarkSet>) -> Self {
        Self {
            faces,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Detects nothing.
    #[must_use]
    pub const fn no_faces() -> Self {
        Self::new(Vec::new())
    }

    /// Fails every call with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            faces: Vec::new(),
            failure: Some(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `detect` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LandmarkProvider for MockLandmarkProvider {
    fn detect(&self, _image: &RgbImage) -> anyhow::Result<Vec<LandmarkSet>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => anyhow::bail!("{message}"),
            None => Ok(self.faces.clone()),
        }
    }
}

type ScoreFn = Box<dyn Fn(&RgbImage) -> f32 + Send + Sync>;

/// Classifier with a scripted probability per image.
///
/// Records every input size it is given.
pub struct MockClassifier {
    input_size: (u32, u32),
    score: ScoreFn,
    failure: Option<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl MockClassifier {
    /// Returns `probability` for every image.
    #[must_use]
    pub fn fixed(side: u32, probability: f32) -> Self {
        Self::from_fn(side, move |_| probability)
    }

    /// Scores each image with `score`.
    #[must_use]
    pub fn from_fn(side: u32, score: impl Fn(&RgbImage) -> f32 + Send + Sync + 'static) -> Self {
        Self {
            input_size: (side, side),
            score: Box::new(score),
            failure: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with `message`.
    #[must_use]
    pub fn failing(side: u32, message: impl Into<String>) -> Self {
        let mut mock = Self::fixed(side, 0.0);
        mock.failure = Some(message.into());
        mock
    }

    /// Number of `predict` calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Dimensions of every image passed to `predict`.
    #[must_use]
    pub fn seen_sizes(&self) -> Vec<(u32, u32)> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Classifier for MockClassifier {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn predict(&self, images: &[RgbImage]) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            anyhow::bail!("{message}");
        }
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(images.iter().map(RgbImage::dimensions));
        Ok(images.iter().map(|image| (self.score)(image)).collect())
    }
}

/// Labeled source over an in-memory sample list, never shuffled.
///
/// Must hold at least one sample; an empty source never yields a batch.
/// Counts how many batches all of its streams have produced.
pub struct MockLabeledSource {
    samples: Vec<(RgbImage, f32)>,
    pulls: Arc<AtomicUsize>,
}

impl MockLabeledSource {
    /// Wraps `samples` in order.
    #[must_use]
    pub fn new(samples: Vec<(RgbImage, f32)>) -> Self {
        Self {
            samples,
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Batches produced so far across every stream.
    #[must_use]
    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

impl LabeledImageSource for MockLabeledSource {
    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn batches(&self, batch_size: usize) -> BatchStream<'_> {
        let pulls = Arc::clone(&self.pulls);
        let samples = &self.samples;
        let epochs = std::iter::repeat(()).flat_map(move |()| samples.chunks(batch_size.max(1)));
        Box::new(epochs.map(move |chunk| {
            pulls.fetch_add(1, Ordering::SeqCst);
            let (images, labels) = chunk.iter().cloned().unzip();
            Ok::<_, anyhow::Error>(LabeledBatch::new(images, labels))
        }))
    }
}

/// A call made on a [`MockStagedModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelCall {
    /// `configure(stage, learning_rate)`.
    Configure(Stage, f64),
    /// Weights at `version` saved.
    Save(u64),
    /// Weights at `version` loaded.
    Load(u64),
    /// Weights at `version` restored from a snapshot.
    Restore(u64),
}

/// Staged model whose "weights" are a version counter.
///
/// Every training batch bumps the version. Evaluation returns the scripted
/// `(loss, accuracy)` for the current version: entry `v - 1` for version
/// `v`, the last entry once the script runs out.
pub struct MockStagedModel {
    name: String,
    version: u64,
    script: Vec<(f64, f64)>,
    calls: Vec<ModelCall>,
    trained_batches: usize,
}

impl MockStagedModel {
    /// Creates a model named `name` with the given validation script.
    #[must_use]
    pub fn new(name: impl Into<String>, script: Vec<(f64, f64)>) -> Self {
        Self {
            name: name.into(),
            version: 0,
            script,
            calls: Vec::new(),
            trained_batches: 0,
        }
    }

    /// Current weight version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> &[ModelCall] {
        &self.calls
    }

    /// Training batches seen.
    #[must_use]
    pub const fn trained_batches(&self) -> usize {
        self.trained_batches
    }

    fn scripted(&self) -> (f64, f64) {
        let index = usize::try_from(self.version.saturating_sub(1)).unwrap_or(usize::MAX);
        self.script
            .get(index)
            .or_else(|| self.script.last())
            .copied()
            .unwrap_or((1.0, 0.0))
    }
}

impl StagedModel for MockStagedModel {
    type Snapshot = u64;

    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, stage: Stage, learning_rate: f64) -> anyhow::Result<()> {
        self.calls.push(ModelCall::Configure(stage, learning_rate));
        Ok(())
    }

    fn train_batch(&mut self, batch: &LabeledBatch) -> anyhow::Result<BatchMetrics> {
        self.version += 1;
        self.trained_batches += 1;
        Ok(BatchMetrics {
            loss: 0.5,
            correct: batch.len() / 2,
            count: batch.len(),
        })
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn evaluate_batch(&self, batch: &LabeledBatch) -> anyhow::Result<BatchMetrics> {
        let (loss, accuracy) = self.scripted();
        Ok(BatchMetrics {
            loss,
            correct: (accuracy * batch.len() as f64).round() as usize,
            count: batch.len(),
        })
    }

    fn snapshot(&self) -> anyhow::Result<u64> {
        Ok(self.version)
    }

    fn restore(&mut self, snapshot: u64) -> anyhow::Result<()> {
        self.version = snapshot;
        self.calls.push(ModelCall::Restore(snapshot));
        Ok(())
    }

    fn save(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.version.to_string())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    fn load(&mut self, path: &Path) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.version = text.trim().parse()?;
        self.calls.push(ModelCall::Load(self.version));
        Ok(())
    }
}

/// Mock implementation of `ProgressSink` for testing.
///
/// Captures events for later assertions.
#[derive(Default)]
pub struct MockProgressSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MockProgressSink {
    /// Creates a new mock progress sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured events.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stages announced, in order.
    #[must_use]
    pub fn stages(&self) -> Vec<(Stage, f64)> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::StageStarted {
                    stage,
                    learning_rate,
                    ..
                } => Some((*stage, *learning_rate)),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of `EpochCompleted` events.
    #[must_use]
    pub fn epoch_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ProgressEvent::EpochCompleted { .. }))
            .count()
    }
}

impl ProgressSink for MockProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample(value: u8, label: f32) -> (RgbImage, f32) {
        (RgbImage::from_pixel(2, 2, Rgb([value, 0, 0])), label)
    }

    #[test]
    fn test_labeled_source_partial_batch_and_restart() {
        let source = MockLabeledSource::new((0..5).map(|i| sample(i, 0.0)).collect());
        let sizes: Vec<usize> = source
            .batches(2)
            .take(4)
            .map(|b| b.unwrap().len())
            .collect();
        assert_eq!(sizes, [2, 2, 1, 2]);
        assert_eq!(source.pull_count(), 4);
    }

    #[test]
    fn test_mock_classifier_records_sizes() {
        let classifier = MockClassifier::fixed(4, 0.8);
        let out = classifier.predict(&[RgbImage::new(4, 4)]).unwrap();
        assert_eq!(out, [0.8]);
        assert_eq!(classifier.seen_sizes(), [(4, 4)]);
        assert_eq!(classifier.call_count(), 1);
    }

    #[test]
    fn test_staged_model_script_follows_version() {
        let mut model = MockStagedModel::new("m", vec![(0.9, 0.5), (0.4, 0.8)]);
        let batch = LabeledBatch::new(vec![RgbImage::new(1, 1); 10], vec![0.0; 10]);
        model.train_batch(&batch).unwrap();
        assert_eq!(model.evaluate_batch(&batch).unwrap().correct, 5);
        model.train_batch(&batch).unwrap();
        assert_eq!(model.evaluate_batch(&batch).unwrap().correct, 8);
        model.train_batch(&batch).unwrap();
        assert_eq!(model.evaluate_batch(&batch).unwrap().correct, 8);
    }
}
