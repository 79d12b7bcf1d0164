//! Directory-per-class labeled datasets.
//!
//! Layout: `<root>/<class>/<image>`, exactly two class directories. Samples
//! of the positive class are labeled `1.0`, the other class `0.0`.

use std::path::{Path, PathBuf};

use anyhow::Context;
use asd_screen_core::ports::{BatchStream, LabeledImageSource};
use asd_screen_core::training::LabeledBatch;
use asd_screen_core::TrainingError;
use image::imageops::FilterType;
use image::RgbImage;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::augment::{AugmentConfig, Augmenter};
use crate::fs::is_supported_image;

/// Split subdirectory names under a dataset root.
pub const SPLITS: [&str; 3] = ["train", "valid", "test"];

/// How a dataset is read.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Square side every image is resized to.
    pub image_size: u32,
    /// Class directory labeled `1.0`.
    pub positive_class: String,
    /// Seed for shuffling and augmentation.
    pub seed: u64,
    /// Reshuffle at the start of every epoch.
    pub shuffle: bool,
    /// Random transforms, if any.
    pub augmentation: Option<AugmentConfig>,
}

impl DatasetConfig {
    /// Unshuffled, unaugmented reading at `image_size`.
    #[must_use]
    pub fn new(image_size: u32, positive_class: impl Into<String>) -> Self {
        Self {
            image_size,
            positive_class: positive_class.into(),
            seed: 42,
            shuffle: false,
            augmentation: None,
        }
    }

    /// Enables per-epoch shuffling with `seed`.
    #[must_use]
    pub const fn shuffled(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.seed = seed;
        self
    }

    /// Enables augmentation.
    #[must_use]
    pub const fn augmented(mut self, augmentation: AugmentConfig) -> Self {
        self.augmentation = Some(augmentation);
        self
    }
}

/// One labeled image on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Image file.
    pub path: PathBuf,
    /// `1.0` for the positive class.
    pub label: f32,
}

/// Labeled images discovered under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryDataset {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<Sample>,
    config: DatasetConfig,
}

impl DirectoryDataset {
    /// Scans `root` for class directories and their images.
    ///
    /// # Errors
    ///
    /// Fails if `root` is missing, does not hold exactly two class
    /// directories, the positive class is absent, or no image is found.
    pub fn open(root: impl AsRef<Path>, config: DatasetConfig) -> Result<Self, TrainingError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(TrainingError::MissingDataset(root));
        }

        let mut classes: Vec<String> = std::fs::read_dir(&root)
            .map_err(|_| TrainingError::MissingDataset(root.clone()))?
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_owned))
            .collect();
        classes.sort();

        if classes.len() != 2 {
            return Err(TrainingError::ClassCount {
                root,
                found: classes.len(),
                classes,
            });
        }
        if !classes.contains(&config.positive_class) {
            return Err(TrainingError::UnknownPositiveClass {
                positive: config.positive_class,
                classes,
            });
        }

        let mut samples = Vec::new();
        for class in &classes {
            let label = if *class == config.positive_class { 1.0 } else { 0.0 };
            let mut files: Vec<PathBuf> = std::fs::read_dir(root.join(class))
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|entry| entry.path())
                        .filter(|path| path.is_file() && is_supported_image(path))
                        .collect()
                })
                .unwrap_or_default();
            files.sort();
            debug!("Class {class}: {} images", files.len());
            samples.extend(files.into_iter().map(|path| Sample { path, label }));
        }

        if samples.is_empty() {
            return Err(TrainingError::EmptyDataset(root));
        }

        info!(
            "Found {} images belonging to {} classes in {}",
            samples.len(),
            classes.len(),
            root.display()
        );

        Ok(Self {
            root,
            classes,
            samples,
            config,
        })
    }

    /// Dataset root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Class directory names, sorted.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Discovered samples in load order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Reading configuration.
    #[must_use]
    pub const fn config(&self) -> &DatasetConfig {
        &self.config
    }

    fn load(
        &self,
        sample: &Sample,
        augmenter: Option<(&Augmenter, &mut ChaCha8Rng)>,
    ) -> anyhow::Result<RgbImage> {
        let size = self.config.image_size;
        let image = image::open(&sample.path)
            .with_context(|| format!("Failed to open image: {}", sample.path.display()))?
            .resize_exact(size, size, FilterType::Triangle)
            .to_rgb8();
        Ok(match augmenter {
            Some((augmenter, rng)) => augmenter.apply(&image, rng),
            None => image,
        })
    }
}

impl LabeledImageSource for DirectoryDataset {
    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn batches(&self, batch_size: usize) -> BatchStream<'_> {
        Box::new(DatasetBatches::new(self, batch_size))
    }
}

/// Infinite batch iterator over a [`DirectoryDataset`].
///
/// The visiting order of each epoch depends only on the seed and the epoch
/// number, never on the batch size.
pub struct DatasetBatches<'a> {
    dataset: &'a DirectoryDataset,
    batch_size: usize,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    shuffle_rng: ChaCha8Rng,
    augment: Option<(Augmenter, ChaCha8Rng)>,
}

impl<'a> DatasetBatches<'a> {
    fn new(dataset: &'a DirectoryDataset, batch_size: usize) -> Self {
        let seed = dataset.config.seed;
        Self {
            dataset,
            batch_size: batch_size.max(1),
            order: (0..dataset.samples.len()).collect(),
            cursor: 0,
            epoch: 0,
            shuffle_rng: ChaCha8Rng::seed_from_u64(seed),
            augment: dataset.config.augmentation.map(|config| {
                let rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));
                (Augmenter::new(config), rng)
            }),
        }
    }

    /// Completed epochs.
    #[must_use]
    pub const fn epoch(&self) -> usize {
        self.epoch
    }
}

impl Iterator for DatasetBatches<'_> {
    type Item = anyhow::Result<LabeledBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.order.is_empty() {
            return None;
        }
        if self.cursor == 0 && self.dataset.config.shuffle {
            self.order.sort_unstable();
            self.order.shuffle(&mut self.shuffle_rng);
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let mut images = Vec::with_capacity(end - self.cursor);
        let mut labels = Vec::with_capacity(end - self.cursor);
        for &index in &self.order[self.cursor..end] {
            let sample = &self.dataset.samples[index];
            let augmenter = self.augment.as_mut().map(|(a, rng)| (&*a, rng));
            match self.dataset.load(sample, augmenter) {
                Ok(image) => images.push(image),
                Err(e) => return Some(Err(e)),
            }
            labels.push(sample.label);
        }

        self.cursor = end;
        if self.cursor == self.order.len() {
            self.cursor = 0;
            self.epoch += 1;
        }

        Some(Ok(LabeledBatch::new(images, labels)))
    }
}

/// Opens the `train`, `valid` and `test` splits under `root`.
///
/// Only the training split is augmented. The test split is never shuffled.
///
/// # Errors
///
/// Returns the first split that fails to open.
pub fn open_splits(
    root: &Path,
    image_size: u32,
    positive_class: &str,
    seed: u64,
    augmentation: AugmentConfig,
) -> Result<[DirectoryDataset; 3], TrainingError> {
    let base = DatasetConfig::new(image_size, positive_class);
    let [train, valid, test] = SPLITS.map(|split| root.join(split));
    Ok([
        DirectoryDataset::open(train, base.clone().shuffled(seed).augmented(augmentation))?,
        DirectoryDataset::open(valid, base.clone().shuffled(seed))?,
        DirectoryDataset::open(test, base)?,
    ])
}
