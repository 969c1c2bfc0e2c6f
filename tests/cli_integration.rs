//! CLI Integration Tests
//!
//! Tests for the CLI interface using assert_cmd

use assert_cmd::Command;
use image::{GrayImage, Luma};
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn pagecrop_cmd() -> Command {
    // Use CARGO_BIN_EXE_<name> environment variable set by cargo test
    Command::new(env!("CARGO_BIN_EXE_pagecrop"))
}

/// 200x300 white page with a dark block at columns 40..160, rows 50..250.
/// Detected bounds with the default settings are (30, 40, 170, 260).
fn write_page(dir: &Path, name: &str) {
    let mut img = GrayImage::from_pixel(200, 300, Luma([255]));
    for y in 50..250 {
        for x in 40..160 {
            img.put_pixel(x, y, Luma([20]));
        }
    }
    img.save(dir.join(name)).unwrap();
}

fn write_blank(dir: &Path, name: &str) {
    GrayImage::from_pixel(64, 64, Luma([255]))
        .save(dir.join(name))
        .unwrap();
}

/// Temp workspace with `png/` holding `pages` and `out/` as the target
fn workspace(pages: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("png");
    std::fs::create_dir(&input).unwrap();
    for name in pages {
        write_page(&input, name);
    }
    temp
}

fn crop_in(temp: &TempDir) -> Command {
    let mut cmd = pagecrop_cmd();
    cmd.current_dir(temp.path()).args(["crop", "png", "out"]);
    cmd
}

#[test]
fn test_help_command() {
    pagecrop_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pagecrop"))
        .stdout(predicate::str::contains("crop"))
        .stdout(predicate::str::contains("detect"))
        .stdout(predicate::str::contains("combine"))
        .stdout(predicate::str::contains("info"));
}

#[test]
fn test_version_command() {
    pagecrop_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_info_command() {
    pagecrop_cmd()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("pagecrop"))
        .stdout(predicate::str::contains("System Information"))
        .stdout(predicate::str::contains("Threshold: 250"))
        .stdout(predicate::str::contains("pagecrop.toml"));
}

#[test]
fn test_crop_missing_input_directory() {
    let temp = TempDir::new().unwrap();

    pagecrop_cmd()
        .current_dir(temp.path())
        .args(["crop", "does-not-exist", "out", "--yes"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Input directory not found"));
}

#[test]
fn test_crop_empty_directory() {
    let temp = workspace(&[]);

    crop_in(&temp)
        .arg("--yes")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No images"));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_crop_accepts_with_yes() {
    let temp = workspace(&["page_002.png", "page_001.png", "page_003.png"]);

    crop_in(&temp)
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[1/3] Successfully processed: page_001.png",
        ))
        .stdout(predicate::str::contains(
            "[3/3] Successfully processed: page_003.png",
        ))
        .stdout(predicate::str::contains("Bounds: (30, 40, 170, 260)"));

    for name in ["page_001.png", "page_002.png", "page_003.png"] {
        let img = image::open(temp.path().join("out").join(format!("cropped_{}", name))).unwrap();
        assert_eq!((img.width(), img.height()), (140, 220));
    }
}

#[test]
fn test_crop_prompt_enter_continues() {
    let temp = workspace(&["a.png", "b.png"]);

    crop_in(&temp)
        .arg("--no-preview")
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Detected bounds: (30, 40, 170, 260)"))
        .stdout(predicate::str::contains("Press Enter"));

    assert!(temp.path().join("out/cropped_b.png").exists());
}

#[test]
fn test_crop_prompt_removes_preview() {
    let temp = workspace(&["a.png", "b.png"]);
    let tmp = temp.path().join("tmp");
    std::fs::create_dir(&tmp).unwrap();

    crop_in(&temp)
        .env("TMPDIR", &tmp)
        .arg("--no-preview")
        .write_stdin("\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("pagecrop-preview-"));

    assert_eq!(std::fs::read_dir(&tmp).unwrap().count(), 0);
    assert!(temp.path().join("out/cropped_a.png").exists());
}

#[test]
fn test_crop_prompt_abort() {
    let temp = workspace(&["a.png", "b.png"]);

    crop_in(&temp)
        .arg("--no-preview")
        .write_stdin("q\n")
        .assert()
        .code(7)
        .stdout(predicate::str::contains("Aborted by user."));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_crop_closed_stdin_aborts() {
    let temp = workspace(&["a.png"]);

    crop_in(&temp)
        .arg("--no-preview")
        .write_stdin("")
        .assert()
        .code(7);

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_crop_uniform_reference_fails_detection() {
    let temp = workspace(&["b.png"]);
    write_blank(&temp.path().join("png"), "a.png");

    crop_in(&temp)
        .arg("--yes")
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Could not detect content bounds"));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_crop_manual_bounds() {
    let temp = workspace(&["a.png"]);
    write_blank(&temp.path().join("png"), "b.png");

    crop_in(&temp)
        .args(["--yes", "--bounds", "10", "20", "60", "50"])
        .assert()
        .success();

    let img = image::open(temp.path().join("out/cropped_b.png")).unwrap();
    assert_eq!((img.width(), img.height()), (50, 30));
}

#[test]
fn test_crop_inverted_bounds_rejected() {
    let temp = workspace(&["a.png"]);

    crop_in(&temp)
        .args(["--yes", "--bounds", "60", "20", "10", "50"])
        .assert()
        .code(2);

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_crop_corrupt_item_does_not_stop_batch() {
    let temp = workspace(&["a.png", "c.png"]);
    std::fs::write(temp.path().join("png/b.png"), b"not a png").unwrap();

    crop_in(&temp)
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("[2/3] Error processing b.png"))
        .stdout(predicate::str::contains("Processed 2 of 3 images"));

    assert!(temp.path().join("out/cropped_c.png").exists());
    assert!(!temp.path().join("out/cropped_b.png").exists());
}

#[test]
fn test_crop_limit() {
    let temp = workspace(&["a.png", "b.png", "c.png"]);

    crop_in(&temp)
        .args(["--yes", "--limit", "2"])
        .assert()
        .success();

    assert!(temp.path().join("out/cropped_b.png").exists());
    assert!(!temp.path().join("out/cropped_c.png").exists());
}

#[test]
fn test_crop_with_pdf() {
    let temp = workspace(&["a.png", "b.png", "c.png"]);

    crop_in(&temp)
        .args(["--yes", "--pdf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Combined PDF created"));

    let doc = lopdf::Document::load(temp.path().join("out/all-cropped.pdf")).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn test_crop_writes_json_report() {
    let temp = workspace(&["a.png", "b.png"]);
    let report = temp.path().join("report.json");

    crop_in(&temp)
        .args(["--yes", "-q", "--report"])
        .arg(&report)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["attempted"], 2);
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["results"][0]["status"], "succeeded");
}

#[test]
fn test_crop_dry_run() {
    let temp = workspace(&["a.png", "b.png"]);

    crop_in(&temp)
        .args(["--dry-run", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry Run"))
        .stdout(predicate::str::contains("Images found: 2"))
        .stdout(predicate::str::contains("Images to process: 1"));

    assert!(!temp.path().join("out").exists());
}

#[test]
fn test_crop_config_file() {
    let temp = workspace(&["a.png"]);
    let config = temp.path().join("custom.toml");
    std::fs::write(
        &config,
        "[detection]\npadding = 0\n\n[output]\nprefix = \"trim_\"\n",
    )
    .unwrap();

    crop_in(&temp)
        .args(["--yes", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Bounds: (40, 50, 160, 250)"));

    assert!(temp.path().join("out/trim_a.png").exists());
}

#[test]
fn test_crop_missing_config_file() {
    let temp = workspace(&["a.png"]);

    crop_in(&temp)
        .args(["--yes", "--config", "missing.toml"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_detect_command() {
    let temp = workspace(&["a.png"]);

    pagecrop_cmd()
        .arg("detect")
        .arg(temp.path().join("png/a.png"))
        .assert()
        .success()
        .stdout(predicate::str::contains("(30, 40, 170, 260)"))
        .stdout(predicate::str::contains("--bounds 30 40 170 260"));
}

#[test]
fn test_detect_uniform_image() {
    let temp = TempDir::new().unwrap();
    write_blank(temp.path(), "blank.png");

    pagecrop_cmd()
        .arg("detect")
        .arg(temp.path().join("blank.png"))
        .assert()
        .code(6);
}

#[test]
fn test_combine_command() {
    let temp = workspace(&["a.png", "b.png"]);
    std::fs::write(temp.path().join("png/c.png"), b"broken").unwrap();
    let output = temp.path().join("book.pdf");

    pagecrop_cmd()
        .arg("combine")
        .arg(temp.path().join("png"))
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 pages"))
        .stderr(predicate::str::contains("Skipped c.png"));

    let doc = lopdf::Document::load(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}
