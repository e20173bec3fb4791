mod common;

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use common::{ActivationReply, FakeHost, knockgate};

fn fixture(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .display()
        .to_string()
}

// ============================================================================
// version command
// ============================================================================

#[test]
fn version_human() {
    let output = knockgate(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("knockgate "), "unexpected output: {stdout}");
}

#[test]
fn version_json() {
    let output = knockgate(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version JSON should be valid");
    assert_eq!(parsed["name"], "knockgate");
    assert!(parsed["version"].is_string());
}

// ============================================================================
// check command
// ============================================================================

#[test]
fn check_stock_config() {
    let output = knockgate(&["check", &fixture("stock.yaml"), "--quiet"]);
    assert!(
        output.status.success(),
        "stock config should validate: {}",
        String::from_utf8_lossy(&output.stdout)
    );
}

#[test]
fn check_inverted_window_fails_with_config_exit_code() {
    let output = knockgate(&[
        "check",
        &fixture("stock.yaml"),
        &fixture("inverted_window.yaml"),
        "--format",
        "json",
        "--quiet",
    ]);
    assert_eq!(output.status.code(), Some(2));

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reports[0]["valid"], true);
    assert_eq!(reports[1]["valid"], false);
    let errors = reports[1]["errors"].as_array().unwrap();
    assert!(
        errors
            .iter()
            .any(|e| e.as_str().unwrap().contains("windows.second")),
        "error should name the window: {errors:?}"
    );
}

#[test]
fn check_strict_rejects_warnings() {
    let lenient = knockgate(&["check", &fixture("pinpoint_window.yaml"), "--quiet"]);
    assert!(lenient.status.success());

    let strict = knockgate(&["check", &fixture("pinpoint_window.yaml"), "--strict", "--quiet"]);
    assert_eq!(strict.status.code(), Some(2));
}

#[test]
fn check_missing_file() {
    let output = knockgate(&["check", "/definitely/not/here.yaml", "--quiet"]);
    assert!(!output.status.success());
}

#[test]
fn unknown_subcommand_is_usage_error() {
    let output = knockgate(&["knock-knock"]);
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// run command
// ============================================================================

#[tokio::test]
async fn scripted_run_navigates() {
    let host = FakeHost::start(ActivationReply::Json(r#"{"path": "/vault"}"#)).await;

    let child = tokio::process::Command::new(env!("CARGO_BIN_EXE_knockgate"))
        .args([
            "run",
            "--config",
            &fixture("fast.yaml"),
            "--base-url",
            &host.base_url,
            "--script",
            &fixture("fast_clicks.yaml"),
            "--format",
            "json",
            "--quiet",
        ])
        .env_remove("KNOCKGATE_METRICS_PORT")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to spawn knockgate");

    let output = tokio::time::timeout(Duration::from_secs(20), child.wait_with_output())
        .await
        .expect("scripted run did not finish")
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "navigated");
    assert_eq!(report["target"], format!("{}/vault", host.base_url));
    assert_eq!(report["resets"], 0);
}

#[test]
fn run_rejects_unordered_script() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("clicks.yaml");
    std::fs::write(
        &script,
        "steps:\n  - { at_ms: 500, zone: a }\n  - { at_ms: 100, zone: b }\n",
    )
    .unwrap();

    let output = knockgate(&["run", "--script", script.to_str().unwrap(), "--quiet"]);
    assert_eq!(output.status.code(), Some(64));
}
