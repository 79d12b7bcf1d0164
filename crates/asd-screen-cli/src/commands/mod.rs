//! CLI command definitions and handlers.

pub mod models;
pub mod predict;
pub mod train;

use std::path::Path;

use anyhow::{Context, Result};
use asd_screen_adapters::{model_path, set_models_dir, BLAZEFACE};
use asd_screen_core::inference::{eye_regions, BlazeFace, BLAZEFACE_LEFT_EYE, BLAZEFACE_RIGHT_EYE};
use asd_screen_core::region::{EyeRegions, ExtractorConfig};
use candle_core::Device;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::config::EyesConfig;

/// ASD Screen - face and eye based autism screening
#[derive(Parser)]
#[command(name = "asd-screen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Screen images with the face and eye classifiers
    Predict(predict::PredictArgs),
    /// Train the face and eye classifiers on a dataset
    Train(train::TrainArgs),
    /// Inspect the models directory
    Models(models::ModelsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Every input was screened.
    Success = 0,
    /// At least one input was rejected or failed.
    Rejected = 1,
    /// Fatal error.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}

/// Applies a models directory override, if one was given.
pub fn apply_models_dir(dir: Option<&Path>) {
    if let Some(dir) = dir {
        debug!("Using custom models directory: {}", dir.display());
        set_models_dir(Some(dir.to_path_buf()));
    }
}

/// Generate ISO 8601 UTC timestamp (RFC 3339 format).
pub fn iso_timestamp() -> String {
    match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            debug!("Timestamp format failed: {e}");
            String::from("1970-01-01T00:00:00Z")
        }
    }
}

/// Loads the landmark detector from the models directory.
///
/// # Errors
///
/// Fails if the weight file is missing or does not load.
pub fn load_detector(device: &Device) -> Result<BlazeFace> {
    let path = model_path(BLAZEFACE).context("No BlazeFace entry in the model table")?;
    if !path.exists() {
        anyhow::bail!(
            "Landmark detector weights not found: {}. Place blazeface.safetensors in the models directory.",
            path.display()
        );
    }
    info!("Loading landmark detector from {}", path.display());
    BlazeFace::load(&path, device)
}

/// Eye extraction settings for the BlazeFace landmark layout, with
/// config file overrides applied.
pub fn extractor_config(eyes: &EyesConfig) -> ExtractorConfig {
    let mut config = ExtractorConfig::default().with_regions(eye_regions());
    if eyes.left_range.is_some() || eyes.right_range.is_some() {
        let left = eyes.left_range.map_or(BLAZEFACE_LEFT_EYE, |[s, e]| s..e);
        let right = eyes.right_range.map_or(BLAZEFACE_RIGHT_EYE, |[s, e]| s..e);
        config = config.with_regions(EyeRegions::new(left, right));
    }
    if let Some(pad_x) = eyes.pad_x {
        config.pad_x = pad_x;
    }
    if let Some(pad_y) = eyes.pad_y {
        config.pad_y = pad_y;
    }
    if let Some(side) = eyes.crop_size {
        config = config.with_crop_size(side, side);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_defaults_to_blazeface_layout() {
        let config = extractor_config(&EyesConfig::default());
        assert_eq!(config.regions, eye_regions());
        assert_eq!(config.crop_size, (128, 128));
    }

    #[test]
    fn test_extractor_overrides() {
        let eyes = EyesConfig {
            left_range: Some([33, 133]),
            crop_size: Some(64),
            pad_y: Some(0.1),
            ..EyesConfig::default()
        };
        let config = extractor_config(&eyes);

        assert_eq!(config.regions.candidates, vec![33..133, BLAZEFACE_RIGHT_EYE]);
        assert_eq!(config.crop_size, (64, 64));
        assert!((config.pad_y - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::Rejected as u8, 1);
        assert_eq!(ExitCode::Error as u8, 2);
    }
}
