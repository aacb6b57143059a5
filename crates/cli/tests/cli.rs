//! End-to-end tests of the `nb` binary
//!
//! Each test points `NB_CONFIG_DIR` at a fresh temporary directory so no
//! user configuration is read or written.

use std::process::{Command, Output};

use tempfile::TempDir;

fn nb(config_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nb"))
        .args(args)
        .env("NB_CONFIG_DIR", config_dir.path())
        .env_remove("NB_PROFILE")
        .env_remove("NB_LOG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute nb")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

#[test]
fn test_profile_list_empty_json() {
    let dir = TempDir::new().unwrap();
    let output = nb(&dir, &["profile", "list", "--json"]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), serde_json::json!({ "profiles": [] }));
}

#[test]
fn test_profile_set_then_list_hides_secrets() {
    let dir = TempDir::new().unwrap();
    let output = nb(
        &dir,
        &[
            "profile", "set", "work", "aws", "AKIDEXAMPLE", "s3cr3t", "--default", "--json",
        ],
    );
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["profile"], "work");
    assert!(dir.path().join("config.toml").exists());

    let output = nb(&dir, &["profile", "list", "--json"]);
    assert!(output.status.success());
    let json = stdout_json(&output);
    let profiles = json["profiles"].as_array().unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0]["name"], "work");
    assert_eq!(profiles[0]["provider"], "aws");
    assert_eq!(profiles[0]["default"], true);
    assert!(!String::from_utf8_lossy(&output.stdout).contains("s3cr3t"));
}

#[test]
fn test_mock_bucket_listing_is_empty() {
    let dir = TempDir::new().unwrap();
    let output = nb(&dir, &["--mock", "s3", "ls", "--json"]);
    assert!(output.status.success());
    assert_eq!(stdout_json(&output), serde_json::json!({ "buckets": [] }));
}

#[test]
fn test_missing_bucket_exits_not_found() {
    let dir = TempDir::new().unwrap();
    let output = nb(&dir, &["--mock", "s3", "rb", "nope"]);
    assert_eq!(output.status.code(), Some(5));
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope"));
}

#[test]
fn test_provider_command_without_profile_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = nb(&dir, &["files", "ls"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_profile_for_wrong_provider_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let set = nb(&dir, &["profile", "set", "cloud", "aws", "AK", "SK", "--quiet"]);
    assert!(set.status.success());

    let output = nb(&dir, &["--profile", "cloud", "files", "ls"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("rackspace"));
}

#[test]
fn test_remove_unknown_profile_exits_not_found() {
    let dir = TempDir::new().unwrap();
    let output = nb(&dir, &["profile", "remove", "ghost", "--json"]);
    assert_eq!(output.status.code(), Some(5));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let json: serde_json::Value = serde_json::from_str(&stderr).unwrap();
    assert!(json["error"].as_str().unwrap().contains("ghost"));
}
