//! # CLI Tests
//!
//! Runs the `hpetl` binary in a scratch directory and checks exit codes.

use assert_cmd::prelude::*;
use hpetl::snapshot::{read_snapshot, write_snapshot};
use hpetl::Character;
use hpetl_test_utils::sample_raw_records;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// An `hpetl` command isolated from the caller's environment.
fn hpetl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hpetl").unwrap();
    cmd.current_dir(dir)
        .env_remove("HPETL_CONFIG")
        .env_remove("MONGO_CONNECTION")
        .env("DATA_DIR", dir.join("data"));
    cmd
}

#[test]
fn test_transform_without_raw_snapshot_fails() {
    let dir = tempdir().unwrap();

    hpetl(dir.path())
        .arg("transform")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[hpetl error]"))
        .stderr(predicate::str::contains("run the previous stage first"));

    assert!(!dir.path().join("data/2.transformed_data.json").exists());
}

#[test]
fn test_transform_writes_transformed_snapshot() {
    let dir = tempdir().unwrap();
    write_snapshot(&dir.path().join("data/1.raw_data.json"), &sample_raw_records()).unwrap();

    hpetl(dir.path())
        .args(["transform", "--policy", "abort"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 written"));

    let characters: Vec<Character> =
        read_snapshot(&dir.path().join("data/2.transformed_data.json")).unwrap();
    assert_eq!(characters.len(), 3);
}

#[test]
fn test_unknown_policy_is_rejected() {
    let dir = tempdir().unwrap();

    hpetl(dir.path())
        .args(["transform", "--policy", "ignore"])
        .assert()
        .failure();
}

#[test]
fn test_load_without_transformed_snapshot_fails() {
    let dir = tempdir().unwrap();

    hpetl(dir.path())
        .arg("load")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_load_against_unreachable_store_fails() {
    let dir = tempdir().unwrap();
    write_snapshot(&dir.path().join("data/1.raw_data.json"), &sample_raw_records()).unwrap();
    hpetl(dir.path()).arg("transform").assert().success();

    hpetl(dir.path())
        .arg("load")
        .env("MONGO_CONNECTION", "mongodb://127.0.0.1:1/")
        .env("HPETL_RETRY__RETRY_COUNT", "1")
        .env("HPETL_RETRY__CONNECT_TIMEOUT_SECS", "1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("[hpetl error]"));
}

#[test]
fn test_config_file_overrides_data_dir() {
    let dir = tempdir().unwrap();
    let custom = dir.path().join("custom");
    write_snapshot(&custom.join("1.raw_data.json"), &sample_raw_records()).unwrap();
    std::fs::write(
        dir.path().join("etl.yml"),
        format!("data_dir: {}\n", custom.display()),
    )
    .unwrap();

    Command::cargo_bin("hpetl")
        .unwrap()
        .current_dir(dir.path())
        .env_remove("DATA_DIR")
        .env_remove("HPETL_DATA_DIR")
        .args(["--config", "etl.yml", "transform"])
        .assert()
        .success();

    assert!(custom.join("2.transformed_data.json").exists());
}
