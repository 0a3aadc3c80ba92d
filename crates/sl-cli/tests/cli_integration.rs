//! CLI integration tests
//!
//! Tests the sandloop CLI using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn sandloop() -> Command {
    Command::cargo_bin("sandloop")
        .expect("Failed to locate sandloop binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    sandloop()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sandloop"))
        .stdout(predicate::str::contains(
            "Multi-node dialogue round orchestrator",
        ));
}

#[test]
fn test_cli_version() {
    sandloop()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sandloop"));
}

#[test]
fn test_cli_help_lists_rounds_and_output_flags() {
    sandloop()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--rounds"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_cli_missing_config_file_fails() {
    sandloop()
        .args(["--config", "/nonexistent/sandloop.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_cli_rejects_config_without_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.toml");
    std::fs::write(&path, "nodes = []\n").unwrap();

    sandloop()
        .args(["--config", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
