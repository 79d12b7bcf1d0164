//! Train command - two-stage training of the face and eye classifiers.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use asd_screen_adapters::{
    model_path, models_dir, open_splits, AugmentConfig, EYE_CLASSIFIER, FACE_CLASSIFIER,
};
use asd_screen_core::inference::{
    select_device, CandleTrainer, ClassifierSpec, DEFAULT_DROPOUT, FACE_INPUT_SIZE,
};
use asd_screen_core::training::{Feed, ModalityFeeds, TrainingStreamPair};
use asd_screen_core::{
    EyeLocator, Orchestrator, RegionExtractor, TrainingError, TrainingPlan, TrainingReport,
};
use clap::{Args, ValueEnum};
use tracing::info;

use super::{apply_models_dir, extractor_config, load_detector};
use crate::config::AppConfig;
use crate::output::{JsonOutput, ProgressBar};

/// Hardcoded training defaults.
mod defaults {
    pub const FACE_BATCH_SIZE: usize = 16;
    pub const EYE_BATCH_SIZE: usize = 32;
    pub const SEED: u64 = 42;
    pub const POSITIVE_CLASS: &str = "autistic";
}

/// Which classifiers to train.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ModalitySelection {
    /// Face then eye
    #[default]
    Both,
    /// Face classifier only
    Face,
    /// Eye classifier only
    Eye,
}

impl ModalitySelection {
    const fn face(self) -> bool {
        matches!(self, Self::Both | Self::Face)
    }

    const fn eye(self) -> bool {
        matches!(self, Self::Both | Self::Eye)
    }
}

/// Arguments for training.
#[derive(Args, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct TrainArgs {
    /// Dataset root containing `train/`, `valid/` and `test/` class directories
    pub dataset: PathBuf,

    /// Classifiers to train
    #[arg(long, value_enum, default_value_t = ModalitySelection::Both)]
    pub modality: ModalitySelection,

    /// Epochs with the backbone frozen
    #[arg(long)]
    pub stage1_epochs: Option<usize>,

    /// Fine-tuning epochs
    #[arg(long)]
    pub stage2_epochs: Option<usize>,

    /// Early stopping patience in epochs
    #[arg(long)]
    pub patience: Option<usize>,

    /// Stage 1 learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Face stream batch size
    #[arg(long)]
    pub face_batch_size: Option<usize>,

    /// Eye stream batch size
    #[arg(long)]
    pub eye_batch_size: Option<usize>,

    /// Shuffle and augmentation seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Class directory labeled positive
    #[arg(long)]
    pub positive_class: Option<String>,

    /// Disable training augmentation
    #[arg(long)]
    pub no_augment: bool,

    /// Custom models directory (checkpoints are written here)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Run on the CPU even if an accelerator is available
    #[arg(long)]
    pub cpu: bool,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl TrainArgs {
    /// Apply configuration file values, respecting CLI precedence.
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        let t = &config.training;
        args.stage1_epochs = args.stage1_epochs.or(t.stage1_epochs);
        args.stage2_epochs = args.stage2_epochs.or(t.stage2_epochs);
        args.patience = args.patience.or(t.patience);
        args.learning_rate = args.learning_rate.or(t.learning_rate);
        args.face_batch_size = args.face_batch_size.or(t.face_batch_size);
        args.eye_batch_size = args.eye_batch_size.or(t.eye_batch_size);
        args.seed = args.seed.or(t.seed);
        if args.positive_class.is_none() {
            args.positive_class.clone_from(&t.positive_class);
        }

        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }
        if args.models_dir.is_none() {
            args.models_dir.clone_from(&config.models.dir);
        }

        args.config = Some(config.clone());

        args
    }

    fn plan(&self) -> TrainingPlan {
        let defaults = TrainingPlan::default();
        TrainingPlan {
            stage1_epochs: self.stage1_epochs.unwrap_or(defaults.stage1_epochs),
            stage2_epochs: self.stage2_epochs.unwrap_or(defaults.stage2_epochs),
            patience: self.patience.unwrap_or(defaults.patience),
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            fine_tune_divisor: self
                .config
                .as_ref()
                .and_then(|c| c.training.fine_tune_divisor)
                .unwrap_or(defaults.fine_tune_divisor),
        }
    }

    fn face_batch_size(&self) -> usize {
        self.face_batch_size.unwrap_or(defaults::FACE_BATCH_SIZE)
    }

    fn eye_batch_size(&self) -> usize {
        self.eye_batch_size.unwrap_or(defaults::EYE_BATCH_SIZE)
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or(defaults::SEED)
    }

    fn positive_class(&self) -> &str {
        self.positive_class
            .as_deref()
            .unwrap_or(defaults::POSITIVE_CLASS)
    }

    fn dropout(&self) -> f32 {
        self.config
            .as_ref()
            .and_then(|c| c.training.dropout)
            .unwrap_or(DEFAULT_DROPOUT)
    }

    fn augmentation(&self) -> AugmentConfig {
        if self.no_augment {
            return AugmentConfig::none();
        }
        let mut aug = AugmentConfig::default();
        if let Some(c) = self.config.as_ref().map(|c| &c.augmentation) {
            aug.rotation_range = c.rotation_range.unwrap_or(aug.rotation_range);
            aug.width_shift = c.width_shift.unwrap_or(aug.width_shift);
            aug.height_shift = c.height_shift.unwrap_or(aug.height_shift);
            aug.zoom = c.zoom.unwrap_or(aug.zoom);
            aug.horizontal_flip = c.horizontal_flip.unwrap_or(aug.horizontal_flip);
        }
        aug
    }
}

/// Run the train command and print one report per trained classifier.
///
/// Expects `args` to have been processed through `with_config()` first.
pub fn run(args: &TrainArgs) -> Result<Vec<TrainingReport>> {
    info!("Training on {}", args.dataset.display());

    let (face_bs, eye_bs) = (args.face_batch_size(), args.eye_batch_size());
    if face_bs == 0 || eye_bs == 0 {
        return Err(TrainingError::ZeroBatchSize.into());
    }

    apply_models_dir(args.models_dir.as_deref());
    let dir = models_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create models directory {}", dir.display()))?;

    let [train, valid, test] = open_splits(
        &args.dataset,
        FACE_INPUT_SIZE,
        args.positive_class(),
        args.seed(),
        args.augmentation(),
    )?;
    info!(
        "Dataset: {} train, {} valid, {} test samples; classes {:?}",
        train.samples().len(),
        valid.samples().len(),
        test.samples().len(),
        train.classes()
    );

    let device = select_device(args.cpu);
    let eyes = if args.modality.eye() {
        let detector = load_detector(&device)?;
        let eyes_config = args.config.as_ref().map(|c| c.eyes.clone()).unwrap_or_default();
        Some(EyeLocator::new(
            Arc::new(detector),
            RegionExtractor::new(extractor_config(&eyes_config)),
        ))
    } else {
        None
    };

    let plan = args.plan();
    let epochs_per_model = (plan.stage1_epochs + plan.stage2_epochs) as u64;
    let models = u64::from(args.modality.face()) + u64::from(args.modality.eye());
    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress = ProgressBar::new(Some(epochs_per_model * models), args.quiet, show_progress);
    let orchestrator = Orchestrator::new(plan, &progress);

    let (face_train, eye_train) = match (&eyes, args.modality.face()) {
        (Some(eyes), true) => {
            let pair = TrainingStreamPair::new(&train, face_bs, eye_bs, eyes.clone());
            (Some(pair.face), Some(pair.eye))
        }
        (Some(eyes), false) => (None, Some(Feed::eye(&train, eye_bs, eyes.clone()))),
        (None, _) => (Some(Feed::face(&train, face_bs)), None),
    };

    let mut reports = Vec::new();

    if let Some(face_train) = face_train {
        let spec = ClassifierSpec::face().with_dropout(args.dropout());
        let mut trainer = CandleTrainer::new(spec, device.clone())?;
        let mut feeds = ModalityFeeds {
            train: face_train,
            valid: Feed::face(&valid, face_bs),
            test: Feed::face(&test, face_bs),
        };
        let checkpoint = model_path(FACE_CLASSIFIER).context("No face classifier entry")?;
        reports.push(orchestrator.run(&mut trainer, &mut feeds, &checkpoint)?);
    }

    if let (Some(eyes), Some(eye_train)) = (eyes, eye_train) {
        let mut trainer =
            CandleTrainer::new(ClassifierSpec::eye().with_dropout(args.dropout()), device)?;
        let mut feeds = ModalityFeeds {
            train: eye_train,
            valid: Feed::eye(&valid, eye_bs, eyes.clone()),
            test: Feed::eye(&test, eye_bs, eyes),
        };
        let checkpoint = model_path(EYE_CLASSIFIER).context("No eye classifier entry")?;
        reports.push(orchestrator.run(&mut trainer, &mut feeds, &checkpoint)?);
    }

    progress.finish();

    JsonOutput::stdout().write_value(&reports, args.pretty)?;

    Ok(reports)
}
