//! Binary-level tests for the `process`, `sweep` and `run` subcommands

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn bot(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("image-utility-bot").unwrap();
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("IMAGE_BOT_WORK_DIR")
        .arg("--config")
        .arg(dir.join("missing.yaml"))
        .arg("--work-dir")
        .arg(dir.join("work"));
    cmd
}

#[test]
fn test_process_writes_result_beside_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_jpeg(dir.path(), "holiday.jpg", 2400, 1600);

    bot(dir.path())
        .args(["process", "--operation", "png", "--size", "1080p", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("processed.png"))
        .stdout(predicate::str::contains("1620x1080"));

    let output = image::open(dir.path().join("processed.png")).unwrap();
    assert_eq!((output.width(), output.height()), (1620, 1080));
    assert!(common::files_with_prefix(&dir.path().join("work"), "output-").is_empty());
}

#[test]
fn test_process_explicit_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_jpeg(dir.path(), "in.jpg", 100, 50);
    let target = dir.path().join("converted.bmp");

    bot(dir.path())
        .args(["process", "--operation", "bmp", "--input"])
        .arg(&input)
        .arg("--output")
        .arg(&target)
        .assert()
        .success();

    let output = image::open(&target).unwrap();
    assert_eq!((output.width(), output.height()), (100, 50));
}

#[test]
fn test_process_will_not_overwrite_its_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_jpeg(dir.path(), "processed.jpg", 40, 20);
    let original = std::fs::read(&input).unwrap();

    bot(dir.path())
        .args(["process", "--operation", "jpg", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("would overwrite the input"));

    assert_eq!(std::fs::read(&input).unwrap(), original);
}

#[test]
fn test_process_rejects_unknown_size() {
    let dir = tempfile::tempdir().unwrap();
    let input = common::write_jpeg(dir.path(), "in.jpg", 10, 10);

    bot(dir.path())
        .args(["process", "--size", "4k", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("4k"));
}

#[test]
fn test_process_reports_corrupt_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.jpg");
    std::fs::write(&input, b"").unwrap();

    bot(dir.path())
        .args(["process", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read image file"));
}

#[test]
fn test_sweep_removes_only_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir(&work).unwrap();
    std::fs::write(work.join("upload-old.jpg"), b"12345").unwrap();
    std::fs::write(work.join("output-old.png"), b"12345").unwrap();
    std::fs::write(work.join("keep.txt"), b"12345").unwrap();

    bot(dir.path())
        .arg("sweep")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 file(s), 10 bytes"));

    assert!(work.join("keep.txt").exists());
    assert!(!work.join("upload-old.jpg").exists());
}

#[test]
fn test_run_without_token_fails() {
    let dir = tempfile::tempdir().unwrap();

    bot(dir.path())
        .env_remove("TELEGRAM_BOT_TOKEN")
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No TELEGRAM_BOT_TOKEN found"));
}

#[test]
fn test_invalid_config_file_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "processing:\n  jpeg_quality: 0\n").unwrap();

    let mut cmd = Command::cargo_bin("image-utility-bot").unwrap();
    cmd.arg("--config")
        .arg(&config)
        .arg("sweep")
        .assert()
        .failure()
        .stderr(predicate::str::contains("jpeg_quality"));
}
