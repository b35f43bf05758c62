//! Runner help, version, and argument validation specs
//!
//! These exit before the PID lock is taken or a port is bound.

use crate::prelude::*;

#[test]
fn version_shows_name_and_version() {
    conveyor()
        .arg("--version")
        .assert()
        .success()
        .stdout("conveyor 0.1.0\n");
}

#[test]
fn help_lists_runner_flags() {
    let output = conveyor().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--port",
        "--workers",
        "--workspace-dir",
        "--workers-dir",
        "--queue-capacity",
        "--pid-file",
        "--log-level",
        "--shutdown-timeout-secs",
    ] {
        assert!(stdout.contains(flag), "expected {flag} in help, got: {stdout}");
    }
}

#[test]
fn help_does_not_create_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    conveyor()
        .current_dir(dir.path())
        .arg("--help")
        .assert()
        .success();
    assert!(!dir.path().join("conveyor.pid").exists());
}

#[test]
fn zero_workers_is_rejected() {
    let output = conveyor().args(["--workers", "0"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("at least 1"), "got: {stderr}");
}

#[test]
fn zero_queue_capacity_is_rejected() {
    conveyor()
        .args(["--queue-capacity", "0"])
        .assert()
        .failure();
}

#[test]
fn unknown_argument_is_rejected() {
    let output = conveyor().arg("--frobnicate").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--frobnicate"), "got: {stderr}");
}
