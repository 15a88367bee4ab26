#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn cloudrig() -> Command {
    let mut cmd = Command::cargo_bin("cloudrig").unwrap();
    cmd.env_remove("AWS_REGION").env_remove("RUST_LOG").env("NO_COLOR", "1");
    cmd
}

/// Top-level help lists every subcommand
#[test]
fn test_cli_help() {
    cloudrig()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("destroy"))
        .stdout(predicate::str::contains("sweep"))
        .stdout(predicate::str::contains("quota"))
        .stdout(predicate::str::contains("tags"));
}

#[test]
fn test_cli_version() {
    cloudrig()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cloudrig"));
}

#[test]
fn test_invalid_command() {
    cloudrig().arg("provision").assert().failure();
}

/// plan requires a manifest
#[test]
fn test_plan_requires_file() {
    cloudrig()
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--file"));
}

/// The manifest is read before any AWS call
#[test]
fn test_plan_missing_manifest() {
    let dir = tempfile::tempdir().unwrap();
    cloudrig()
        .current_dir(dir.path())
        .args(["plan", "-f", "missing.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read manifest"));
}

#[test]
fn test_plan_invalid_manifest() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.yaml"), "resources: [unterminated\n").unwrap();

    cloudrig()
        .current_dir(dir.path())
        .args(["plan", "-f", "broken.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse manifest"));
}

#[test]
fn test_apply_duplicate_resource() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("resources.yaml"),
        "resources:\n  \
         - {type: aws_glue_workflow, name: etl}\n  \
         - {type: aws_glue_workflow, name: etl}\n",
    )
    .unwrap();

    cloudrig()
        .current_dir(dir.path())
        .args(["apply", "-f", "resources.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("declared twice"));
}

/// state list works offline against an empty project
#[test]
fn test_state_list_empty() {
    let dir = tempfile::tempdir().unwrap();
    cloudrig()
        .args(["state", "list", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No resources recorded"));
}

#[test]
fn test_state_list_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().join(".cloudrig");
    fs::create_dir(&state_dir).unwrap();
    fs::write(
        state_dir.join("state.json"),
        r#"{
  "version": 1,
  "updated_at": "2026-01-01T00:00:00Z",
  "resources": {
    "aws_glue_workflow.etl": {
      "id": "nightly-etl",
      "resource_type": "aws_glue_workflow",
      "status": "active",
      "attributes": {"name": "nightly-etl"},
      "config": {"name": "nightly-etl"},
      "created_at": "2026-01-01T00:00:00Z",
      "updated_at": "2026-01-01T00:00:00Z"
    },
    "aws_dx_hosted_connection.test": {
      "id": "dxcon-fg5678gh",
      "resource_type": "aws_dx_hosted_connection",
      "status": "pending",
      "remote_status": "ordering",
      "attributes": {"connection_id": "dxcon-fgabcdef"},
      "created_at": "2026-01-01T00:00:00Z",
      "updated_at": "2026-01-01T00:00:00Z"
    }
  }
}"#,
    )
    .unwrap();

    cloudrig()
        .args(["state", "list", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("aws_glue_workflow.etl"))
        .stdout(predicate::str::contains("nightly-etl"))
        .stdout(predicate::str::contains("pending (ordering)"));

    cloudrig()
        .args(["state", "show", "aws_glue_workflow.etl", "-C"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"resource_type\": \"aws_glue_workflow\""));

    cloudrig()
        .args(["state", "show", "aws_glue_workflow.other", "-C"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("not recorded in state"));
}

/// quota takes either a code or a name, never both
#[test]
fn test_quota_conflicting_selectors() {
    cloudrig()
        .args([
            "quota",
            "--service-code",
            "vpc",
            "--quota-code",
            "L-F678F1CE",
            "--quota-name",
            "VPCs per Region",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_quota_requires_selector() {
    cloudrig()
        .args(["quota", "--service-code", "vpc"])
        .assert()
        .failure();
}

#[test]
fn test_sweep_requires_region() {
    cloudrig()
        .arg("sweep")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--region"));
}
