//! Shared fixtures for CLI integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::path::Path;

use asd_screen_core::inference::{BlazeFace, CandleTrainer, ClassifierSpec};
use asd_screen_core::StagedModel;
use asd_screen_test_support::SyntheticImageBuilder;
use assert_cmd::Command;
use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};

/// The binary under test, isolated from any user config.
#[allow(deprecated)]
pub fn asd_screen(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("asd-screen").unwrap();
    cmd.current_dir(cwd)
        .env("XDG_CONFIG_HOME", cwd.join("xdg-config"))
        .env("XDG_DATA_HOME", cwd.join("xdg-data"));
    cmd
}

/// Writes randomly initialised detector weights.
pub fn write_detector(models: &Path) {
    std::fs::create_dir_all(models).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    BlazeFace::new(vb).unwrap();
    varmap.save(models.join("blazeface.safetensors")).unwrap();
}

/// Writes randomly initialised face and eye classifier weights.
pub fn write_classifiers(models: &Path) {
    let face = CandleTrainer::new(ClassifierSpec::face(), Device::Cpu).unwrap();
    face.save(&models.join("face_classifier.safetensors")).unwrap();
    let eye = CandleTrainer::new(ClassifierSpec::eye(), Device::Cpu).unwrap();
    eye.save(&models.join("eye_classifier.safetensors")).unwrap();
}

/// Writes `count` small PNGs per class for each split under `root`.
pub fn write_dataset(root: &Path, classes: &[&str], count: usize) {
    for split in ["train", "valid", "test"] {
        for (c, class) in classes.iter().enumerate() {
            let dir = root.join(split).join(class);
            std::fs::create_dir_all(&dir).unwrap();
            for i in 0..count {
                let index = u8::try_from(c * 100 + i).unwrap();
                let image = SyntheticImageBuilder::indexed(index, 16);
                image.save(dir.join(format!("{i}.png"))).unwrap();
            }
        }
    }
}

/// Parses every stdout line as JSON.
pub fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
