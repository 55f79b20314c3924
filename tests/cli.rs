//! Integration tests for the surface-probe CLI.
//!
//! Runs the built binary against the bundled fixtures and checks the JSON
//! report on stdout and the exit codes.

use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

/// Run the binary with a config path that does not exist, so defaults apply
fn run_cli(args: &[&str], config: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_surface-probe"))
        .args(args)
        .arg("--config")
        .arg(config)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute surface-probe")
}

fn report(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Output should be valid JSON ({}). Got: {}", e, stdout))
}

#[test]
fn test_cli_reports_surfaces_and_placement() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let page = fixture("claude.json");

    let output = run_cli(&[page.to_str().unwrap()], &config);
    assert!(output.status.success());

    let json = report(&output);
    assert_eq!(json["platform"], "claude");
    assert_eq!(json["editor_kind"], "prose_mirror");
    assert!(json["surfaces"]["editor"].is_number());
    assert!(json["surfaces"]["send_action"].is_number());
    assert!(json["surfaces"]["anchor"].is_number());
    assert_eq!(json["status"]["overlay_mounted"], true);
    assert_eq!(json["status"]["placement"], "toolbar");
    assert_eq!(json["status"]["watchdog"], "watching");
}

#[test]
fn test_cli_floating_fallback_without_anchor() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let page = fixture("perplexity.json");

    let output = run_cli(&[page.to_str().unwrap()], &config);
    let json = report(&output);
    assert_eq!(json["platform"], "perplexity");
    assert!(json["surfaces"]["anchor"].is_null());
    assert_eq!(json["status"]["placement"], "floating");
}

#[test]
fn test_cli_injects_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let page = fixture("gemini.json");
    let blocks = fixture("blocks.json");

    let output = run_cli(
        &[
            page.to_str().unwrap(),
            "--blocks",
            blocks.to_str().unwrap(),
            "--inject",
        ],
        &config,
    );
    assert!(output.status.success());

    let json = report(&output);
    let text = json["editor_text"].as_str().unwrap();
    assert!(text.starts_with("=== RELEVANT MEMORIES FROM LETTA ==="));
    assert!(text.contains("[human]\nName: Sam\nPrefers concise answers"));
    assert!(json.get("inject_error").is_none());
    assert_eq!(json["status"]["injected"].as_array().unwrap().len(), 2);
}

#[test]
fn test_cli_respects_disabled_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[general]\nenabled = false\n").unwrap();
    let page = fixture("chatgpt.json");

    let output = run_cli(&[page.to_str().unwrap()], &config);
    let json = report(&output);
    assert_eq!(json["platform"], "chatgpt");
    assert_eq!(json["status"]["overlay_mounted"], false);
    assert_eq!(json["status"]["capture_attached"], false);
    assert_eq!(json["status"]["watchdog"], "watching");
}

#[test]
fn test_cli_unknown_argument_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_surface-probe"))
        .arg("--bogus")
        .output()
        .expect("Failed to execute surface-probe");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown argument"));
}

#[test]
fn test_cli_missing_page_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_surface-probe"))
        .output()
        .expect("Failed to execute surface-probe");
    assert!(!output.status.success());
}
