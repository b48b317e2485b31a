//! CLI Integration Tests
//!
//! These tests run the `sensortag` binary. Tests that need a powered-on
//! SensorTag are marked with #[ignore].
//!
//! Run offline tests:
//! ```
//! cargo test --package sensortag-cli --test cli_integration
//! ```
//!
//! Run hardware tests:
//! ```
//! SENSORTAG_DEVICE="CC2650" cargo test --package sensortag-cli --test cli_integration -- --ignored --nocapture
//! ```

use std::process::{Command, Output};

fn run_sensortag(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sensortag"))
        .args(args)
        .env_remove("SENSORTAG_DEVICE")
        .output()
        .expect("Failed to run sensortag binary")
}

// =============================================================================
// Help and Version Tests (no hardware required)
// =============================================================================

#[test]
fn test_help_command() {
    let output = run_sensortag(&["--help"]);
    assert!(output.status.success(), "Help should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["scan", "services", "read", "snapshot", "watch", "config"] {
        assert!(stdout.contains(command), "Help should list {} command", command);
    }
}

#[test]
fn test_version_command() {
    let output = run_sensortag(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("sensortag"));
}

#[test]
fn test_unknown_sensor_is_rejected() {
    let output = run_sensortag(&["read", "gps"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown sensor 'gps'"));
    assert!(stderr.contains("luxometer"));
}

#[test]
fn test_watch_requires_sensor() {
    let output = run_sensortag(&["watch"]);
    assert!(!output.status.success());
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_set_get_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_sensortag"))
            .args(args)
            .env("XDG_CONFIG_HOME", dir.path())
            .output()
            .expect("Failed to run sensortag binary")
    };

    let output = run(&["config", "path"]);
    assert!(output.status.success());
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(path.ends_with("sensortag/config.toml"));

    assert!(run(&["config", "set", "scan-timeout", "4"]).status.success());
    let output = run(&["config", "get", "scan-timeout"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "4");

    let output = run(&["config", "set", "format", "yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid format"));
}

// =============================================================================
// Hardware Tests
// =============================================================================

#[test]
#[ignore = "requires BLE hardware"]
fn test_read_json_from_device() {
    let output = Command::new(env!("CARGO_BIN_EXE_sensortag"))
        .args(["read", "--json", "luxometer"])
        .output()
        .expect("Failed to run sensortag binary");
    assert!(
        output.status.success(),
        "read failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["measurements"][0]["sensor"], "luxometer");
}

#[test]
#[ignore = "requires BLE hardware"]
fn test_watch_count_from_device() {
    let output = Command::new(env!("CARGO_BIN_EXE_sensortag"))
        .args(["watch", "luxometer", "-n", "2", "--json", "-q"])
        .output()
        .expect("Failed to run sensortag binary");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 2);
}
