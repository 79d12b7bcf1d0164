//! Configuration file support for asd-screen.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/asd-screen/config.toml` (lowest priority)
//! - Project-local: `.asd-screen.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Eye region extraction settings.
    pub eyes: EyesConfig,
    /// Two-stage training settings.
    pub training: TrainingConfig,
    /// Training augmentation ranges.
    pub augmentation: AugmentationConfig,
    /// Model settings.
    pub models: ModelsConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// Eye region extraction configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct EyesConfig {
    /// Landmark index range `[start, end)` tried first.
    pub left_range: Option<[usize; 2]>,
    /// Landmark index range tried second.
    pub right_range: Option<[usize; 2]>,
    /// Horizontal pad per side, fraction of box width.
    pub pad_x: Option<f32>,
    /// Vertical pad per side, fraction of box height.
    pub pad_y: Option<f32>,
    /// Square side of the eye crop.
    pub crop_size: Option<u32>,
}

/// Training configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Frozen-backbone epochs.
    pub stage1_epochs: Option<usize>,
    /// Fine-tuning epochs.
    pub stage2_epochs: Option<usize>,
    /// Early stopping patience.
    pub patience: Option<usize>,
    /// Stage 1 learning rate.
    pub learning_rate: Option<f64>,
    /// Stage 2 learning rate divisor.
    pub fine_tune_divisor: Option<f64>,
    /// Face stream batch size.
    pub face_batch_size: Option<usize>,
    /// Eye stream batch size.
    pub eye_batch_size: Option<usize>,
    /// Shuffle and augmentation seed.
    pub seed: Option<u64>,
    /// Head dropout rate.
    pub dropout: Option<f32>,
    /// Class directory labeled positive.
    pub positive_class: Option<String>,
}

/// Augmentation configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation in degrees.
    pub rotation_range: Option<f32>,
    /// Maximum horizontal shift fraction.
    pub width_shift: Option<f32>,
    /// Maximum vertical shift fraction.
    pub height_shift: Option<f32>,
    /// Zoom range.
    pub zoom: Option<f32>,
    /// Random horizontal flips.
    pub horizontal_flip: Option<bool>,
}

/// Model configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Custom models directory path.
    pub dir: Option<PathBuf>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "json" or "jsonl".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/asd-screen/config.toml`
    /// 2. Project-local: `.asd-screen.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        if let Err(e) = config.validate() {
            eprintln!("warning: {e}");
        }

        config
    }

    /// Validate configuration values are within acceptable ranges.
    fn validate(&self) -> Result<(), String> {
        for (name, range) in [
            ("eyes.left_range", self.eyes.left_range),
            ("eyes.right_range", self.eyes.right_range),
        ] {
            if let Some([start, end]) = range {
                if start >= end {
                    return Err(format!("{name} must satisfy start < end, got [{start}, {end}]"));
                }
            }
        }
        for (name, pad) in [("eyes.pad_x", self.eyes.pad_x), ("eyes.pad_y", self.eyes.pad_y)] {
            if let Some(p) = pad {
                if !(0.0..=2.0).contains(&p) {
                    return Err(format!("{name} must be 0.0-2.0, got {p}"));
                }
            }
        }
        if self.eyes.crop_size == Some(0) {
            return Err("eyes.crop_size must be at least 1".to_string());
        }

        let t = &self.training;
        for (name, size) in [
            ("training.face_batch_size", t.face_batch_size),
            ("training.eye_batch_size", t.eye_batch_size),
        ] {
            if size == Some(0) {
                return Err(format!("{name} must be at least 1"));
            }
        }
        if let Some(lr) = t.learning_rate {
            if lr <= 0.0 {
                return Err(format!("training.learning_rate must be positive, got {lr}"));
            }
        }
        if let Some(d) = t.fine_tune_divisor {
            if d <= 0.0 {
                return Err(format!("training.fine_tune_divisor must be positive, got {d}"));
            }
        }
        if let Some(d) = t.dropout {
            if !(0.0..1.0).contains(&d) {
                return Err(format!("training.dropout must be 0.0-1.0 (exclusive), got {d}"));
            }
        }

        let a = &self.augmentation;
        for (name, value) in [
            ("augmentation.width_shift", a.width_shift),
            ("augmentation.height_shift", a.height_shift),
            ("augmentation.zoom", a.zoom),
        ] {
            if let Some(v) = value {
                if !(0.0..1.0).contains(&v) {
                    return Err(format!("{name} must be 0.0-1.0 (exclusive), got {v}"));
                }
            }
        }
        if let Some(r) = a.rotation_range {
            if !(0.0..=180.0).contains(&r) {
                return Err(format!("augmentation.rotation_range must be 0-180, got {r}"));
            }
        }

        if let Some(ref f) = self.output.format {
            if f != "json" && f != "jsonl" {
                return Err(format!(
                    "output.format must be 'json' or 'jsonl', got '{f}'"
                ));
            }
        }

        Ok(())
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        self.eyes.left_range = other.eyes.left_range.or(self.eyes.left_range);
        self.eyes.right_range = other.eyes.right_range.or(self.eyes.right_range);
        self.eyes.pad_x = other.eyes.pad_x.or(self.eyes.pad_x);
        self.eyes.pad_y = other.eyes.pad_y.or(self.eyes.pad_y);
        self.eyes.crop_size = other.eyes.crop_size.or(self.eyes.crop_size);

        let (t, o) = (&mut self.training, other.training);
        t.stage1_epochs = o.stage1_epochs.or(t.stage1_epochs);
        t.stage2_epochs = o.stage2_epochs.or(t.stage2_epochs);
        t.patience = o.patience.or(t.patience);
        t.learning_rate = o.learning_rate.or(t.learning_rate);
        t.fine_tune_divisor = o.fine_tune_divisor.or(t.fine_tune_divisor);
        t.face_batch_size = o.face_batch_size.or(t.face_batch_size);
        t.eye_batch_size = o.eye_batch_size.or(t.eye_batch_size);
        t.seed = o.seed.or(t.seed);
        t.dropout = o.dropout.or(t.dropout);
        t.positive_class = o.positive_class.or_else(|| t.positive_class.take());

        let (a, o) = (&mut self.augmentation, other.augmentation);
        a.rotation_range = o.rotation_range.or(a.rotation_range);
        a.width_shift = o.width_shift.or(a.width_shift);
        a.height_shift = o.height_shift.or(a.height_shift);
        a.zoom = o.zoom.or(a.zoom);
        a.horizontal_flip = o.horizontal_flip.or(a.horizontal_flip);

        self.models.dir = other.models.dir.or_else(|| self.models.dir.take());

        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
        self.output.progress = other.output.progress.or(self.output.progress);
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("asd-screen").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.asd-screen.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(".asd-screen.toml");
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.training.stage1_epochs.is_none());
        assert!(config.eyes.left_range.is_none());
        assert!(config.output.format.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: AppConfig = toml::from_str("").expect("parse empty config");
        assert!(config.augmentation.zoom.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r"
[general]
recursive = true

[eyes]
left_range = [10, 14]
right_range = [6, 10]
pad_x = 0.3
pad_y = 0.5
crop_size = 96

[training]
stage1_epochs = 3
stage2_epochs = 7
patience = 2
learning_rate = 0.001
fine_tune_divisor = 5.0
face_batch_size = 8
eye_batch_size = 16
seed = 7
dropout = 0.2
positive_class = 'asd'

[augmentation]
rotation_range = 10.0
width_shift = 0.1
height_shift = 0.05
zoom = 0.2
horizontal_flip = false

[models]
dir = '/srv/models'

[output]
format = 'json'
pretty = true
progress = false
";
        let config: AppConfig = toml::from_str(toml).expect("parse full config");

        assert_eq!(config.general.recursive, Some(true));
        assert_eq!(config.eyes.left_range, Some([10, 14]));
        assert_eq!(config.eyes.crop_size, Some(96));
        assert_eq!(config.training.stage2_epochs, Some(7));
        assert_eq!(config.training.positive_class.as_deref(), Some("asd"));
        assert_eq!(config.augmentation.horizontal_flip, Some(false));
        assert_eq!(config.models.dir, Some(PathBuf::from("/srv/models")));
        assert_eq!(config.output.format, Some("json".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_configs() {
        let mut base: AppConfig = toml::from_str(
            r"
[training]
stage1_epochs = 4
patience = 3

[augmentation]
zoom = 0.1
",
        )
        .expect("parse base");

        let override_config: AppConfig = toml::from_str(
            r"
[training]
stage1_epochs = 9

[eyes]
crop_size = 64
",
        )
        .expect("parse override");

        base.merge(override_config);

        assert_eq!(base.training.stage1_epochs, Some(9));
        assert_eq!(base.training.patience, Some(3));
        assert_eq!(base.augmentation.zoom, Some(0.1));
        assert_eq!(base.eyes.crop_size, Some(64));
    }

    #[test]
    fn test_merge_empty_override_preserves_base() {
        let mut base: AppConfig = toml::from_str(
            r"
[training]
positive_class = 'asd'

[output]
format = 'json'
",
        )
        .expect("parse base");

        base.merge(AppConfig::default());

        assert_eq!(base.training.positive_class.as_deref(), Some("asd"));
        assert_eq!(base.output.format.as_deref(), Some("json"));
    }

    #[test]
    fn test_invalid_toml_syntax_handled() {
        let toml = r"
[training
seed = 1
";
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err(), "invalid TOML should return error");
    }

    #[test]
    fn test_invalid_field_type_handled() {
        let toml = r#"
[training]
patience = "forever"
"#;
        let result: Result<AppConfig, _> = toml::from_str(toml);
        assert!(result.is_err(), "type mismatch should return error");
    }

    #[test]
    fn test_validate_reversed_range() {
        let mut config = AppConfig::default();
        config.eyes.right_range = Some([10, 6]);

        let err = config.validate().unwrap_err();
        assert!(err.contains("eyes.right_range"));
    }

    #[test]
    fn test_validate_zero_batch_size() {
        let mut config = AppConfig::default();
        config.training.eye_batch_size = Some(0);

        let err = config.validate().unwrap_err();
        assert!(err.contains("training.eye_batch_size"));
    }

    #[test]
    fn test_validate_training_rates() {
        let mut config = AppConfig::default();
        config.training.learning_rate = Some(-1.0);
        assert!(config.validate().unwrap_err().contains("learning_rate"));

        let mut config = AppConfig::default();
        config.training.dropout = Some(1.0);
        assert!(config.validate().unwrap_err().contains("training.dropout"));
    }

    #[test]
    fn test_validate_augmentation_ranges() {
        let mut config = AppConfig::default();
        config.augmentation.zoom = Some(1.5);
        assert!(config.validate().unwrap_err().contains("augmentation.zoom"));

        let mut config = AppConfig::default();
        config.augmentation.rotation_range = Some(270.0);
        assert!(config
            .validate()
            .unwrap_err()
            .contains("augmentation.rotation_range"));
    }

    #[test]
    fn test_validate_output_format_invalid() {
        let mut config = AppConfig::default();
        config.output.format = Some("xml".to_string());

        let err = config.validate().unwrap_err();
        assert!(err.contains("output.format"));
    }

    #[test]
    fn test_validate_empty_config_passes() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_find_config_in_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".asd-screen.toml"), "").unwrap();

        let found = find_config_in_parents(&nested).unwrap();
        assert_eq!(found, dir.path().join(".asd-screen.toml"));
    }
}
