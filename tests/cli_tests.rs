//! Tests for the robogo binary

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const PASSING: &str = r#"
testcase: passing
steps:
  - name: first
    action: get_time
    args: [unix]
  - name: second
    action: sleep
    args: [10ms]
"#;

const FAILING: &str = r#"
testcase: failing
steps:
  - name: broken
    action: assert
    args: ["1 == 2"]
"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("passing.yaml"), PASSING).unwrap();
    fs::write(dir.path().join("failing.yaml"), FAILING).unwrap();
    dir
}

#[test]
fn test_run_passing_file() {
    let dir = workspace();
    Command::cargo_bin("robogo")
        .unwrap()
        .current_dir(dir.path())
        .args(["run", "passing.yaml", "--parallel"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[PASSED] passing"))
        .stdout(predicate::str::contains("PASSED"));
}

#[test]
fn test_failure_exits_with_one() {
    let dir = workspace();
    Command::cargo_bin("robogo")
        .unwrap()
        .current_dir(dir.path())
        .args(["run", "passing.yaml", "failing.yaml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[FAILED] failing"));
}

#[test]
fn test_json_output() {
    let dir = workspace();
    let output = Command::cargo_bin("robogo")
        .unwrap()
        .current_dir(dir.path())
        .args(["run", "passing.yaml", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["entries"][0]["kind"], "test_case");
    assert_eq!(report["totals"]["passed"], 1);
    assert_eq!(report["step_totals"]["total"], 2);
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = workspace();
    Command::cargo_bin("robogo")
        .unwrap()
        .current_dir(dir.path())
        .args(["run", "absent.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("absent.yaml"));
}

#[test]
fn test_run_requires_files() {
    Command::cargo_bin("robogo")
        .unwrap()
        .arg("run")
        .assert()
        .failure();
}

#[test]
fn test_actions_lists_builtins() {
    Command::cargo_bin("robogo")
        .unwrap()
        .arg("actions")
        .assert()
        .success()
        .stdout(predicate::str::contains("get_random"))
        .stdout(predicate::str::contains("concat"));
}
