// crates/correlator-cli/tests/cli_smoke.rs
// ============================================================================
// Module: CLI Smoke Tests
// Description: Integration tests driving the compiled `correlator` binary.
// Purpose: Exercise reload-rules and start against fixture rule files and
// NDJSON input the way an operator would invoke the binary directly.
// Dependencies: correlator-cli binary, tempfile
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "integration test crate, not production code"
)]

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn correlator_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_correlator"))
}

#[test]
fn cli_reload_rules_accepts_a_valid_document() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let rules_path = dir.path().join("rules.yaml");
    fs::write(
        &rules_path,
        "rules:\n  - id: r1\n    name: Test Rule\n    severity: HIGH\n    conditions:\n      - type: auth_fail\n    actions:\n      - message: test\n",
    )
    .expect("write rule document");

    let output = Command::new(correlator_bin())
        .args(["reload-rules", "--rules"])
        .arg(&rules_path)
        .output()
        .expect("run reload-rules");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 rule(s) validated"), "unexpected stdout: {stdout}");
}

#[test]
fn cli_reload_rules_exits_2_on_invalid_document() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let rules_path = dir.path().join("rules.yaml");
    fs::write(
        &rules_path,
        "rules:\n  - id: r1\n    name: Test Rule\n    severity: HIGH\n    conditions:\n      - type: auth_fail\n",
    )
    .expect("write rule document with no actions");

    let output = Command::new(correlator_bin())
        .args(["reload-rules", "--rules"])
        .arg(&rules_path)
        .output()
        .expect("run reload-rules");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_start_streams_ndjson_and_reports_an_alert_via_stdout() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let rules_path = dir.path().join("rules.yaml");
    fs::write(
        &rules_path,
        "rules:\n  - id: credential_stuffing\n    name: Credential Stuffing\n    severity: HIGH\n    conditions:\n      - type: auth_fail\n        window: 60\n        count: \">= 3\"\n        group_by: [user]\n    actions:\n      - message: credential stuffing detected\n",
    )
    .expect("write rule document");

    let input_path = dir.path().join("events.ndjson");
    let events: String = (0..3)
        .map(|t| format!(r#"{{"type": "auth_fail", "timestamp": {t}, "user": "alice"}}"#))
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(&input_path, events).expect("write ndjson input");

    let output = Command::new(correlator_bin())
        .args(["start", "--rules"])
        .arg(&rules_path)
        .arg("--input")
        .arg(&input_path)
        .output()
        .expect("run start");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("credential stuffing detected"), "unexpected stdout: {stdout}");
}
