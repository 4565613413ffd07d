//! CLI integration tests

use std::process::Command;

/// Test that the launcher shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gestor-launcher", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Safe launcher"),
        "Should show app description"
    );
    assert!(stdout.contains("--debug"), "Should show debug flag");
    assert!(stdout.contains("--port"), "Should show port flag");
    assert!(stdout.contains("--timeout"), "Should show timeout flag");
    assert!(stdout.contains("check"), "Should show check subcommand");
    assert!(stdout.contains("run"), "Should show run subcommand");
}

/// Test that the launcher shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gestor-launcher", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("gestor-launcher"), "Should show binary name");
}

/// Test check subcommand help
#[test]
fn test_check_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gestor-launcher", "--", "check", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "check help should succeed");
    assert!(stdout.contains("--output"), "Should show output flag");
}

/// An unknown flag must be rejected
#[test]
fn test_unknown_flag_fails() {
    let output = Command::new("cargo")
        .args(["run", "-p", "gestor-launcher", "--", "--no-such-flag"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Unknown flag should fail");
}
