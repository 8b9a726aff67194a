//! CLI Integration Tests
//!
//! Tests the `ceal` binary directly using assert_cmd.

#![cfg(not(coverage))]
#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_copy(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("ceal.json");
    fs::copy("test-data/ceal_2024.json", &path).unwrap();
    path
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ceal").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ceal"))
        .stdout(predicate::str::contains("COMMANDS"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ceal").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ceal"));
}

#[test]
fn test_server_help() {
    let mut cmd = Command::cargo_bin("ceal-server").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("CEAL_PORT"));
}

// ═══════════════════════════════════════════════════════════════════════════
// EXPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_export_all_forms() {
    let dir = TempDir::new().unwrap();
    let input = sample_copy(&dir);
    let output = dir.path().join("year_end.xlsx");

    let mut cmd = Command::cargo_bin("ceal").unwrap();
    cmd.arg("export")
        .arg(&input)
        .args(["--year", "2024", "--form", "all", "-o"])
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Export Complete"));

    assert!(output.exists());
}

#[test]
fn test_export_default_file_name() {
    let dir = TempDir::new().unwrap();
    let input = sample_copy(&dir);

    let mut cmd = Command::cargo_bin("ceal").unwrap();
    cmd.current_dir(dir.path())
        .arg("export")
        .arg(&input)
        .args(["--year", "2024", "--form", "fiscal"])
        .assert()
        .success();

    assert!(dir.path().join("CEAL_2024_fiscal.xlsx").exists());
}

#[test]
fn test_export_unknown_form_fails() {
    let dir = TempDir::new().unwrap();
    let input = sample_copy(&dir);

    let mut cmd = Command::cargo_bin("ceal").unwrap();
    cmd.arg("export")
        .arg(&input)
        .args(["--year", "2024", "--form", "budget"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown form type"));
}

#[test]
fn test_export_empty_year_fails() {
    let dir = TempDir::new().unwrap();
    let input = sample_copy(&dir);

    let mut cmd = Command::cargo_bin("ceal").unwrap();
    cmd.current_dir(dir.path())
        .arg("export")
        .arg(&input)
        .args(["--year", "1999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
}

// ═══════════════════════════════════════════════════════════════════════════
// RECALC AND AUDIT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_audit_then_recalc_repairs_snapshot() {
    let dir = TempDir::new().unwrap();
    let input = sample_copy(&dir);

    // Sample file stores raw inputs only
    Command::cargo_bin("ceal")
        .unwrap()
        .arg("audit")
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains("inconsistent derived fields"));

    let before = fs::read_to_string(&input).unwrap();
    Command::cargo_bin("ceal")
        .unwrap()
        .arg("recalc")
        .arg(&input)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"));
    assert_eq!(fs::read_to_string(&input).unwrap(), before);

    Command::cargo_bin("ceal")
        .unwrap()
        .arg("recalc")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Snapshot rewritten"));

    Command::cargo_bin("ceal")
        .unwrap()
        .arg("audit")
        .arg(&input)
        .args(["--year", "2024"])
        .assert()
        .success()
        .stdout(predicate::str::contains("match the formula table"));
}

#[test]
fn test_recalc_missing_file_fails() {
    Command::cargo_bin("ceal")
        .unwrap()
        .args(["recalc", "test-data/nope.json"])
        .assert()
        .failure();
}
