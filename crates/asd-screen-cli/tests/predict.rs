//! End-to-end screening through the binary with freshly initialised weights.
//!
//! Untrained weights make the face count unpredictable, so these tests pin
//! down the output contract rather than particular verdicts.

#![allow(clippy::unwrap_used)]

mod common;

use std::fs;

use asd_screen_test_support::SyntheticImageBuilder;
use common::{asd_screen, json_lines, write_classifiers, write_detector};
use predicates::prelude::*;

fn write_faces(dir: &std::path::Path, count: usize) {
    fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        SyntheticImageBuilder::face(96, 96)
            .image
            .save(dir.join(format!("face_{i}.png")))
            .unwrap();
    }
}

fn is_verdict(record: &serde_json::Value) -> bool {
    record.get("final_label").is_some()
}

#[test]
fn test_one_record_per_image() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    write_detector(&models);
    write_classifiers(&models);
    let images = dir.path().join("images");
    write_faces(&images, 3);

    let output = asd_screen(dir.path())
        .arg("predict")
        .arg("--models-dir")
        .arg(&models)
        .arg("--cpu")
        .arg(&images)
        .output()
        .unwrap();

    assert!(matches!(output.status.code(), Some(0 | 1)));
    let records = json_lines(&output.stdout);
    assert_eq!(records.len(), 3);
    for (i, record) in records.iter().enumerate() {
        let path = record["path"].as_str().unwrap();
        assert!(path.ends_with(&format!("face_{i}.png")));
        if is_verdict(record) {
            let confidence = record["final_confidence"].as_f64().unwrap();
            assert!((0.5..=1.0).contains(&confidence));
            assert!(record["face_label"].is_string());
        } else {
            let kind = record["kind"].as_str().unwrap();
            assert!(kind == "no_face" || kind == "multiple_faces", "{kind}");
        }
    }

    let rejected = records.iter().filter(|r| !is_verdict(r)).count();
    let expected = if rejected > 0 { 1 } else { 0 };
    assert_eq!(output.status.code(), Some(expected));
}

#[test]
fn test_without_classifiers_verdict_is_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    write_detector(&models);
    let images = dir.path().join("images");
    write_faces(&images, 2);

    let output = asd_screen(dir.path())
        .arg("predict")
        .arg("--models-dir")
        .arg(&models)
        .arg("--cpu")
        .arg(&images)
        .output()
        .unwrap();

    for record in json_lines(&output.stdout).iter().filter(|r| is_verdict(r)) {
        assert_eq!(record["final_label"], "Unknown");
        assert_eq!(record["final_confidence"].as_f64(), Some(0.0));
        assert!(record["face_label"].is_null());
        assert!(record["eye_label"].is_null());
    }
}

#[test]
fn test_unreadable_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    write_detector(&models);
    let broken = dir.path().join("broken.jpg");
    fs::write(&broken, b"not a jpeg").unwrap();

    let output = asd_screen(dir.path())
        .arg("predict")
        .arg("--models-dir")
        .arg(&models)
        .arg("--cpu")
        .arg(&broken)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let records = json_lines(&output.stdout);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["kind"], "unreadable_image");
    assert!(records[0]["path"].as_str().unwrap().ends_with("broken.jpg"));
}

#[test]
fn test_project_config_selects_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    write_detector(&models);
    fs::write(dir.path().join("broken.png"), b"nope").unwrap();
    fs::write(
        dir.path().join(".asd-screen.toml"),
        "[output]\nformat = 'json'\n",
    )
    .unwrap();

    asd_screen(dir.path())
        .args(["predict", "--cpu", "--models-dir"])
        .arg(&models)
        .arg(dir.path().join("broken.png"))
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("["));
}

#[test]
fn test_cli_format_overrides_project_config() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    write_detector(&models);
    fs::write(dir.path().join("broken.png"), b"nope").unwrap();
    fs::write(
        dir.path().join(".asd-screen.toml"),
        "[output]\nformat = 'json'\n",
    )
    .unwrap();

    asd_screen(dir.path())
        .args(["predict", "--cpu", "--format", "jsonl", "--models-dir"])
        .arg(&models)
        .arg(dir.path().join("broken.png"))
        .assert()
        .code(1)
        .stdout(predicate::str::starts_with("{"));
}

#[test]
fn test_empty_directory_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    write_detector(&models);
    let empty = dir.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    asd_screen(dir.path())
        .args(["predict", "--cpu", "--models-dir"])
        .arg(&models)
        .arg(&empty)
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());
}
