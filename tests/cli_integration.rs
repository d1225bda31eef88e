//! CLI integration tests for Capstan.
//!
//! These exercise the subcommands that do not need a Fortran compiler:
//! project scaffolding, cleaning, manifest validation, completions.

use std::fs;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the capstan binary command.
fn capstan() -> Command {
    Command::cargo_bin("capstan").unwrap()
}

fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// ============================================================================
// capstan new
// ============================================================================

#[test]
fn test_new_creates_project_layout() {
    let tmp = temp_dir();
    let project = tmp.path().join("heatflow");

    capstan()
        .args(["new", "heatflow"])
        .current_dir(tmp.path())
        .assert()
        .success();

    assert!(project.join("Capstan.toml").exists());
    assert!(project.join("src/heatflow.f90").exists());
    assert!(project.join("app/main.f90").exists());

    let manifest = fs::read_to_string(project.join("Capstan.toml")).unwrap();
    assert!(manifest.contains("name = \"heatflow\""));
    assert!(manifest.contains("implicit-typing = false"));
}

#[test]
fn test_new_lib_only_layout() {
    let tmp = temp_dir();

    capstan()
        .args(["new", "fft-utils", "--lib"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let project = tmp.path().join("fft-utils");
    assert!(project.join("src/fft_utils.f90").exists());
    assert!(!project.join("app").exists());
}

#[test]
fn test_new_rejects_invalid_name() {
    let tmp = temp_dir();

    capstan()
        .args(["new", "9lives"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid package name"));
}

#[test]
fn test_new_refuses_to_overwrite() {
    let tmp = temp_dir();

    capstan()
        .args(["new", "dup"])
        .current_dir(tmp.path())
        .assert()
        .success();

    capstan()
        .args(["new", "dup"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("already a capstan package"));
}

// ============================================================================
// capstan clean
// ============================================================================

#[test]
fn test_clean_removes_build_tree() {
    let tmp = temp_dir();

    capstan()
        .args(["new", "cleanable"])
        .current_dir(tmp.path())
        .assert()
        .success();

    let project = tmp.path().join("cleanable");
    fs::create_dir_all(project.join("build/debug/cleanable")).unwrap();
    fs::write(project.join("build/debug/cleanable/x.o"), "obj").unwrap();

    capstan()
        .arg("clean")
        .current_dir(&project)
        .assert()
        .success();

    assert!(!project.join("build").exists());
}

#[test]
fn test_clean_outside_a_package_fails() {
    let tmp = temp_dir();

    capstan()
        .arg("clean")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Capstan.toml"));
}

// ============================================================================
// manifest validation
// ============================================================================

#[test]
fn test_build_reports_manifest_errors() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("Capstan.toml"),
        "[package]\nname = \"demo\"\nversion = \"not.a.version\"\n",
    )
    .unwrap();

    capstan()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn test_build_rejects_git_dependencies() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("Capstan.toml"),
        "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n\n[dependencies]\nutils = { git = \"https://example.com/utils\" }\n",
    )
    .unwrap();

    capstan()
        .arg("build")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("path dependencies"));
}

// ============================================================================
// completions and help
// ============================================================================

#[test]
fn test_completions_generate() {
    capstan()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("capstan"));
}

#[test]
fn test_help_lists_subcommands() {
    capstan()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("clean"))
        .stdout(predicate::str::contains("test"));
}
