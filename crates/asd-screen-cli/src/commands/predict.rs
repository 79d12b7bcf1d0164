//! Predict command - screen images with the loaded classifiers.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use asd_screen_adapters::{model_path, FsImageSource, EYE_CLASSIFIER, FACE_CLASSIFIER};
use asd_screen_core::inference::{select_device, CandleClassifier, ClassifierSpec};
use asd_screen_core::screening::MAX_DETECTION_DIMENSION;
use asd_screen_core::{
    Classifier, ImageSource, ProgressEvent, ProgressSink, RegionExtractor, RejectionReport,
    ReportOutput, Screener, ScreenerConfig, ScreeningError, ScreeningReport,
};
use candle_core::Device;
use clap::{Args, ValueEnum};
use tracing::{debug, info, warn};

use super::{apply_models_dir, extractor_config, iso_timestamp, load_detector, ExitCode};
use crate::config::AppConfig;
use crate::output::{JsonOutput, OutputRecord, ProgressBar};

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// JSON Lines (one JSON object per line)
    #[default]
    Jsonl,
    /// Single JSON array
    Json,
}

/// Arguments for screening.
#[derive(Args, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct PredictArgs {
    /// Image files or directories to screen
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,

    /// Custom models directory (overrides default and config)
    #[arg(long, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    /// Downscale images whose longest side exceeds this before detection (0 disables)
    #[arg(long, value_name = "PX")]
    pub max_dimension: Option<u32>,

    /// Run on the CPU even if an accelerator is available
    #[arg(long)]
    pub cpu: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl PredictArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if !args.recursive {
            args.recursive = config.general.recursive.unwrap_or(false);
        }

        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_ref()
                .and_then(|s| match s.as_str() {
                    "json" => Some(OutputFormat::Json),
                    "jsonl" => Some(OutputFormat::Jsonl),
                    _ => None,
                });
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

    /// Get output format with fallback to JSONL.
    fn format(&self) -> OutputFormat {
        self.format.unwrap_or(OutputFormat::Jsonl)
    }

    /// Pre-detection downscale limit; `0` disables it.
    fn max_dimension(&self) -> Option<u32> {
        match self.max_dimension {
            Some(0) => None,
            Some(px) => Some(px),
            None => Some(MAX_DETECTION_DIMENSION),
        }
    }
}

/// Result of running the predict command.
#[allow(dead_code)]
pub struct PredictResult {
    /// Images screened.
    pub processed: usize,
    /// Images rejected or failed.
    pub rejected: usize,
    /// Exit code.
    pub exit_code: ExitCode,
}

/// Run the predict command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &PredictArgs) -> Result<PredictResult> {
    info!("Running predict command on {} paths", args.paths.len());

    if args.paths.is_empty() {
        anyhow::bail!("No paths specified");
    }

    apply_models_dir(args.models_dir.as_deref());

    let screener = build_screener(args)?;
    let modalities = screener.loaded_modalities();
    if modalities.is_empty() {
        warn!("No classifier weights found; every verdict will be Unknown");
    } else {
        info!("Loaded modalities: {}", modalities.join(", "));
    }

    let source = FsImageSource::new(args.paths.clone(), args.recursive);
    let total = source.count_hint();

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress_bar = ProgressBar::new(total.map(|t| t as u64), args.quiet, show_progress);

    let output = JsonOutput::stdout();

    screen_all(&source, &screener, &output, &progress_bar, args)
}

/// Loads the detector and whichever classifiers are installed.
fn build_screener(args: &PredictArgs) -> Result<Screener> {
    let device = select_device(args.cpu);
    let detector = load_detector(&device)?;

    let eyes = args.config.as_ref().map(|c| c.eyes.clone()).unwrap_or_default();
    let extractor = RegionExtractor::new(extractor_config(&eyes));

    let mut screener = Screener::new(Arc::new(detector), extractor).with_config(ScreenerConfig {
        max_dimension: args.max_dimension(),
    });

    if let Some(classifier) = load_classifier(FACE_CLASSIFIER, ClassifierSpec::face(), &device) {
        screener = screener.with_face_classifier(classifier);
    }
    if let Some(classifier) = load_classifier(EYE_CLASSIFIER, ClassifierSpec::eye(), &device) {
        screener = screener.with_eye_classifier(classifier);
    }

    Ok(screener)
}

/// A classifier that is missing or fails to load leaves its modality out.
fn load_classifier(
    name: &str,
    spec: ClassifierSpec,
    device: &Device,
) -> Option<Arc<dyn Classifier>> {
    let path = model_path(name)?;
    if !path.exists() {
        info!(
            "{name} disabled: {} not found. Run `asd-screen train` to create it.",
            path.display()
        );
        return None;
    }
    match CandleClassifier::load(&path, spec, device) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            warn!("{name} disabled: {e:#}");
            None
        }
    }
}

/// Screens every image and writes one record per input.
fn screen_all(
    source: &FsImageSource,
    screener: &Screener,
    output: &JsonOutput,
    progress: &ProgressBar,
    args: &PredictArgs,
) -> Result<PredictResult> {
    let files = source.files();
    let total = Some(files.len());
    let mut processed = 0usize;
    let mut rejected = 0usize;
    let mut records: Vec<OutputRecord> = Vec::new();

    for (index, (file, loaded)) in files.iter().zip(source.images()).enumerate() {
        let path = file.to_string_lossy().into_owned();

        progress.on_event(ProgressEvent::Started {
            path: path.clone(),
            index,
            total,
        });

        let outcome = loaded
            .map_err(|e| ScreeningError::UnreadableImage(format!("{e:#}")))
            .and_then(|image| {
                let screening = screener.screen(&image.image)?;
                Ok(ScreeningReport::new(
                    image.path.clone(),
                    iso_timestamp(),
                    image.dimensions(),
                    &screening,
                ))
            });

        let record = match outcome {
            Ok(report) => {
                debug!("{}: {}", report.path, report.final_label);
                progress.on_event(ProgressEvent::Completed {
                    report: report.clone(),
                });
                processed += 1;
                OutputRecord::Report(report)
            }
            Err(e) => {
                if e.is_rejection() {
                    debug!("Rejected {path}: {e}");
                } else {
                    warn!("Screening failed for {path}: {e}");
                }
                progress.on_event(ProgressEvent::Rejected {
                    path: path.clone(),
                    reason: e.to_string(),
                });
                rejected += 1;
                OutputRecord::Rejection(rejection(&path, &e))
            }
        };

        match args.format() {
            OutputFormat::Jsonl => match &record {
                OutputRecord::Report(report) => output.write(report)?,
                OutputRecord::Rejection(rejection) => output.write_rejection(rejection)?,
            },
            OutputFormat::Json => records.push(record),
        }
    }

    if matches!(args.format(), OutputFormat::Json) {
        output.write_array(&records, args.pretty)?;
    }

    output.flush()?;

    progress.on_event(ProgressEvent::Finished {
        processed,
        rejected,
    });

    let exit_code = if rejected > 0 {
        ExitCode::Rejected
    } else {
        ExitCode::Success
    };

    Ok(PredictResult {
        processed,
        rejected,
        exit_code,
    })
}

/// Rejection record; runtime faults are reported generically.
fn rejection(path: &str, error: &ScreeningError) -> RejectionReport {
    let message = if error.is_rejection() {
        error.to_string()
    } else {
        String::from("Internal error while screening image")
    };
    RejectionReport {
        path: path.to_string(),
        kind: error.kind().to_string(),
        error: message,
    }
}
