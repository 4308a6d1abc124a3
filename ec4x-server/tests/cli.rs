//! CLI surface tests for the server binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    Command::cargo_bin("ec4x-server").expect("binary builds")
}

#[test]
fn version_prints_and_exits_zero() {
    bin()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ec4x-server"));
}

#[test]
fn status_on_empty_data_dir_reports_no_games() {
    let dir = tempfile::tempdir().unwrap();
    bin()
        .args(["status", "--data-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("no games"));
}

#[test]
fn resolve_unknown_game_fails_with_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    bin()
        .args(["resolve", "ghost", "--data-dir"])
        .arg(dir.path())
        .env("EC4X_REGEN_IDENTITY", "1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn start_without_identity_refuses() {
    let dir = tempfile::tempdir().unwrap();
    bin()
        .args(["start", "--data-dir"])
        .arg(dir.path())
        .env_remove("EC4X_REGEN_IDENTITY")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("EC4X_REGEN_IDENTITY"));
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    bin().arg("frobnicate").assert().failure();
}
