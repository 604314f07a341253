#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

const CLEAN: &str = r#"
  - revision: 1
    mode: direct
    partitions: 2
    universe: [coprocessor, raftstore::test_compact, raftstore::test_compact_log]
    nodes:
      - index: 0
        format_gate: true
        include: ["*"]
        exclude: [raftstore]
      - index: 1
        include: [raftstore]
"#;

// test_compact_log runs twice; coprocessor never runs.
const BROKEN: &str = r#"
  - revision: 2
    mode: modulo
    partitions: 2
    universe: [coprocessor, raftstore::test_compact, raftstore::test_compact_log]
    jobs:
      - format_gate: true
        include: [raftstore]
      - include: [raftstore::test_compact_log]
"#;

fn plan(revisions: &[&str]) -> String {
    format!("configVersion: 1\nrevisions:{}", revisions.concat())
}

fn shardplan(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("shardplan").unwrap();
    cmd.current_dir(dir).env_remove("SHARDPLAN_CONFIG");
    cmd
}

#[test]
fn test_check_clean_plan() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("shardplan.yaml"), plan(&[CLEAN])).unwrap();

    shardplan(temp.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "revision 1: OK: all 3 universe entries covered exactly once",
        ));
}

#[test]
fn test_check_reports_violations_with_exit_1() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("shardplan.yaml"), plan(&[CLEAN, BROKEN])).unwrap();

    shardplan(temp.path())
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("revision 2: FAIL"))
        .stdout(predicate::str::contains("uncovered: coprocessor"))
        .stdout(predicate::str::contains(
            "overlap: raftstore::test_compact_log (assignments 0, 1)",
        ));

    // The older revision is still clean when selected explicitly.
    shardplan(temp.path())
        .args(["check", "--revision", "1"])
        .assert()
        .success();
}

#[test]
fn test_check_all_revisions_json() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("shardplan.yaml"), plan(&[CLEAN, BROKEN])).unwrap();

    let output = shardplan(temp.path())
        .args(["check", "--all", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let v: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["ok"], false);
    let reports = v["reports"].as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["revision"], 1);
    assert_eq!(reports[0]["uncovered"].as_array().unwrap().len(), 0);
    assert_eq!(reports[1]["uncovered"][0], "coprocessor");
    assert_eq!(reports[1]["overlaps"][0]["ordinals"], serde_json::json!([0, 1]));
}

// Clean by `::` segments, but libtest filters match substrings.
const SIBLINGS: &str = r#"
configVersion: 1
revisions:
  - revision: 1
    mode: direct
    partitions: 3
    universe: [coprocessor::raftstore_reader, raftstore::test_compact, raftstore::test_compact_log]
    nodes:
      - index: 0
        format_gate: true
        include: ["*"]
        exclude: [raftstore]
      - index: 1
        include: [raftstore::test_compact]
      - index: 2
        include: [raftstore::test_compact_log]
"#;

#[test]
fn test_check_reports_substring_filter_mismatches() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("shardplan.yaml"), SIBLINGS).unwrap();

    shardplan(temp.path())
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("revision 1: FAIL"))
        .stdout(predicate::str::contains(
            "filter: assignment 0 runs coprocessor::raftstore_reader but the test tool skips it",
        ))
        .stdout(predicate::str::contains(
            "filter: assignment 1 skips raftstore::test_compact_log but the test tool runs it",
        ));
}

#[test]
fn test_check_exact_filters_accept_sibling_names() {
    let temp = tempdir().unwrap();
    let yaml = format!("{SIBLINGS}tools:\n  test:\n    filter_match: exact\n");
    fs::write(temp.path().join("shardplan.yaml"), yaml).unwrap();

    shardplan(temp.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("revision 1: OK"));
}

#[test]
fn test_check_without_universe_is_unchecked() {
    let temp = tempdir().unwrap();
    let yaml = r#"
configVersion: 1
revisions:
  - revision: 1
    mode: direct
    partitions: 1
    nodes:
      - index: 0
        format_gate: true
        include: ["*"]
"#;
    fs::write(temp.path().join("shardplan.yaml"), yaml).unwrap();

    shardplan(temp.path())
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("revision 1: UNCHECKED"));
}

#[test]
fn test_check_invalid_plan_is_config_error() {
    let temp = tempdir().unwrap();
    // Two gates.
    let yaml = r#"
configVersion: 1
revisions:
  - revision: 1
    mode: direct
    partitions: 2
    nodes:
      - index: 0
        format_gate: true
        include: ["*"]
        exclude: [raftstore]
      - index: 1
        format_gate: true
        include: [raftstore]
"#;
    fs::write(temp.path().join("shardplan.yaml"), yaml).unwrap();

    shardplan(temp.path())
        .arg("check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error: revision 1:"));
}
