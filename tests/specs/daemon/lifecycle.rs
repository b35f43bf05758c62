//! Runner lifecycle specs
//!
//! Verify startup, the PID lock, and two-tier shutdown on signals.

use crate::prelude::*;

#[test]
fn startup_writes_pid_file_and_serves_health() {
    let runner = Runner::start(2);

    let pid = std::fs::read_to_string(runner.pid_file()).unwrap();
    assert_eq!(pid.trim(), runner.pid().to_string());

    let response = runner.get("/health");
    assert_eq!(response.status, 200);
    assert_eq!(response.json(), json!({ "status": "ok" }));

    assert!(runner.path().join("workspace_1").is_dir());
    assert!(runner.path().join("workspace_2").is_dir());
    assert!(runner.path().join("worker_1").is_dir());
    assert!(runner.path().join("worker_2").is_dir());
}

#[test]
fn second_instance_refuses_to_start() {
    let runner = Runner::start(1);

    let output = conveyor()
        .current_dir(runner.path())
        .args(["--bind", "127.0.0.1", "--port", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("conveyor is already running"), "got: {stderr}");
    assert!(
        stderr.contains(&runner.pid().to_string()),
        "expected owner pid, got: {stderr}"
    );

    // The running instance is unaffected
    assert_eq!(runner.get("/health").status, 200);
}

#[test]
fn port_in_use_fails_and_removes_pid_file() {
    let dir = tempfile::tempdir().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port().to_string();

    let output = conveyor()
        .current_dir(dir.path())
        .args(["--bind", "127.0.0.1", "--port", &port])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to bind"), "got: {stderr}");
    assert!(!dir.path().join("conveyor.pid").exists());
}

#[test]
fn sigterm_stops_idle_runner() {
    let mut runner = Runner::start(1);
    runner.signal("-TERM");

    let exit = runner.wait_exit(SPEC_WAIT_MAX_MS).expect("runner should exit");
    assert!(exit.success(), "exit: {exit:?}\nlog: {}", runner.log());
    assert!(!runner.pid_file().exists());
}

#[test]
fn sigint_stops_idle_runner() {
    let mut runner = Runner::start(1);
    runner.signal("-INT");

    let exit = runner.wait_exit(SPEC_WAIT_MAX_MS).expect("runner should exit");
    assert!(exit.success(), "exit: {exit:?}\nlog: {}", runner.log());
}

#[test]
fn graceful_shutdown_lets_running_job_finish() {
    let mut runner = Runner::start(1);
    let id = runner.submit("finishes", &["sleep 0.5; echo finished"]);
    runner.wait_for_status(id, "running");

    runner.signal("-TERM");
    let exit = runner.wait_exit(SPEC_WAIT_MAX_MS).expect("runner should exit");
    assert!(exit.success());

    let log = std::fs::read_to_string(runner.path().join(format!("worker_1/job_{id}.log")))
        .unwrap();
    assert_eq!(log, "finished\n");
}

#[test]
fn shutdown_timeout_kills_running_job() {
    let mut runner = Runner::start(1);
    let id = runner.submit("stuck", &["sleep 30; echo unreachable"]);
    runner.wait_for_status(id, "running");

    let started = std::time::Instant::now();
    runner.signal("-TERM");
    let exit = runner.wait_exit(10_000).expect("runner should exit");
    assert!(exit.success());
    assert!(started.elapsed() < std::time::Duration::from_secs(10));

    let log = std::fs::read_to_string(runner.path().join(format!("worker_1/job_{id}.log")))
        .unwrap_or_default();
    assert!(!log.contains("unreachable"));
    assert!(!runner.pid_file().exists());
}

#[test]
fn second_signal_forces_shutdown() {
    let mut runner = Runner::start_with(1, &["--shutdown-timeout-secs", "60"]);
    let id = runner.submit("stuck", &["sleep 30"]);
    runner.wait_for_status(id, "running");

    runner.signal("-TERM");
    // Still draining: the job keeps running past the first signal
    assert!(runner.wait_exit(300).is_none());

    runner.signal("-TERM");
    let exit = runner.wait_exit(SPEC_WAIT_MAX_MS).expect("runner should exit");
    assert!(exit.success(), "exit: {exit:?}\nlog: {}", runner.log());
}
