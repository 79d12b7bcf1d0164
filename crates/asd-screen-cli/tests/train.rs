//! End-to-end training through the binary on a tiny synthetic dataset.

#![allow(clippy::unwrap_used)]

mod common;

use common::{asd_screen, write_dataset, write_detector};
use predicates::prelude::*;

#[test]
fn test_face_training_writes_checkpoint_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let models = dir.path().join("models");
    write_dataset(&data, &["autistic", "non_autistic"], 2);

    let output = asd_screen(dir.path())
        .arg("train")
        .arg(&data)
        .args([
            "--modality",
            "face",
            "--stage1-epochs",
            "1",
            "--stage2-epochs",
            "1",
            "--face-batch-size",
            "3",
            "--no-augment",
            "--cpu",
            "--quiet",
            "--models-dir",
        ])
        .arg(&models)
        .output()
        .unwrap();

    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(models.join("face_classifier.safetensors").exists());
    assert!(!models.join("eye_classifier.safetensors").exists());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 1);

    let face = &reports[0];
    assert_eq!(face["model"], "face");
    assert_eq!(face["state"], "evaluated");
    assert_eq!(face["steps_per_epoch"], 2);
    assert_eq!(face["test"]["samples"], 4);

    let stages = face["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 2);
    assert_eq!(stages[0]["stage"], "frozen_backbone");
    assert_eq!(stages[1]["stage"], "fine_tune");
    let stage1_lr = stages[0]["learning_rate"].as_f64().unwrap();
    let stage2_lr = stages[1]["learning_rate"].as_f64().unwrap();
    assert!(stage2_lr < stage1_lr);
}

#[test]
fn test_unknown_positive_class_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    write_dataset(&data, &["asd", "typical"], 1);

    asd_screen(dir.path())
        .arg("train")
        .arg(&data)
        .arg("--models-dir")
        .arg(dir.path().join("models"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Positive class 'autistic'"));
}

#[test]
fn test_positive_class_from_project_config() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    write_dataset(&data, &["asd", "typical"], 1);
    std::fs::write(
        dir.path().join(".asd-screen.toml"),
        "[training]\npositive_class = 'asd'\nstage1_epochs = 1\nstage2_epochs = 0\n",
    )
    .unwrap();

    asd_screen(dir.path())
        .arg("train")
        .arg(&data)
        .args(["--modality", "face", "--no-augment", "--cpu", "--quiet", "--models-dir"])
        .arg(dir.path().join("models"))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("\"evaluated\""));
}

#[test]
fn test_three_classes_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    write_dataset(&data, &["autistic", "non_autistic", "other"], 1);

    asd_screen(dir.path())
        .arg("train")
        .arg(&data)
        .arg("--models-dir")
        .arg(dir.path().join("models"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Expected 2 class directories"));
}

#[test]
fn test_eye_training_needs_detector() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    write_dataset(&data, &["autistic", "non_autistic"], 1);

    asd_screen(dir.path())
        .arg("train")
        .arg(&data)
        .args(["--modality", "eye", "--models-dir"])
        .arg(dir.path().join("models"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_eye_training_with_detector() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let models = dir.path().join("models");
    write_dataset(&data, &["autistic", "non_autistic"], 2);
    write_detector(&models);

    let output = asd_screen(dir.path())
        .arg("train")
        .arg(&data)
        .args([
            "--modality",
            "eye",
            "--stage1-epochs",
            "1",
            "--stage2-epochs",
            "1",
            "--eye-batch-size",
            "4",
            "--no-augment",
            "--cpu",
            "--quiet",
            "--models-dir",
        ])
        .arg(&models)
        .output()
        .unwrap();

    assert_eq!(
        output.status.code(),
        Some(0),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(models.join("eye_classifier.safetensors").exists());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["model"], "eye");
    assert_eq!(reports[0]["steps_per_epoch"], 1);
}
