//! Test helpers for behavioral specifications.
//!
//! Provides a small DSL for running the conveyor binary and talking to it
//! over HTTP.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

pub use serde_json::{json, Value};

// Fast status polling so specs don't wait on the 1s default.
const CONVEYOR_POLL_MS: &str = "20";
const CONVEYOR_STOP_GRACE_MS: &str = "500";
// Overridable per runner with --shutdown-timeout-secs
const CONVEYOR_SHUTDOWN_TIMEOUT_SECS: &str = "2";

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Returns the path to a binary, checking llvm-cov target directory first.
/// This works with both standard builds and llvm-cov coverage runs.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where conveyor is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Returns the path to the conveyor binary.
pub fn conveyor_binary() -> PathBuf {
    binary_path("conveyor")
}

/// Returns an assert_cmd Command for the conveyor binary with a clean
/// environment.
pub fn conveyor() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(conveyor_binary());
    for (key, _) in std::env::vars() {
        if key.starts_with("CONVEYOR_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

/// Poll a condition until it returns true or timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll_interval = Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

/// A port that was free a moment ago.
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// =============================================================================
// Runner
// =============================================================================

/// HTTP response from the runner.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("response is not json ({e}): {}", self.body))
    }
}

/// A conveyor process running in its own temporary directory.
///
/// Killed on drop if still running.
pub struct Runner {
    dir: tempfile::TempDir,
    child: Child,
    port: u16,
}

impl Runner {
    /// Start a runner with `workers` workers and wait until it accepts
    /// connections.
    pub fn start(workers: usize) -> Self {
        Self::start_with(workers, &[])
    }

    pub fn start_with(workers: usize, extra_args: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let port = free_port();

        let mut cmd = Command::new(conveyor_binary());
        for (key, _) in std::env::vars() {
            if key.starts_with("CONVEYOR_") {
                cmd.env_remove(key);
            }
        }
        cmd.current_dir(dir.path())
            .args(["--bind", "127.0.0.1"])
            .args(["--port", &port.to_string()])
            .args(["--workers", &workers.to_string()])
            .args(["--log-file", "conveyor.log"])
            .args(extra_args)
            .env("CONVEYOR_POLL_MS", CONVEYOR_POLL_MS)
            .env("CONVEYOR_STOP_GRACE_MS", CONVEYOR_STOP_GRACE_MS)
            .env("CONVEYOR_SHUTDOWN_TIMEOUT_SECS", CONVEYOR_SHUTDOWN_TIMEOUT_SECS)
            .env("RUST_LOG", "debug")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let child = cmd.spawn().expect("conveyor should start");

        let runner = Self { dir, child, port };
        let ready = wait_for(SPEC_WAIT_MAX_MS, || {
            TcpStream::connect(("127.0.0.1", runner.port)).is_ok()
        });
        assert!(ready, "conveyor did not listen\nlog: {}", runner.log());
        runner
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn pid_file(&self) -> PathBuf {
        self.path().join("conveyor.pid")
    }

    /// Runner log contents (for debugging failures).
    pub fn log(&self) -> String {
        std::fs::read_to_string(self.path().join("conveyor.log"))
            .unwrap_or_else(|_| "(no runner log)".to_string())
    }

    /// Send one HTTP request and read the whole response.
    pub fn request(&self, method: &str, path: &str, body: Option<&str>) -> Response {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port)).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let body = body.unwrap_or("");
        let request = format!(
            "{method} {path} HTTP/1.1\r\n\
             Host: 127.0.0.1\r\n\
             Connection: close\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             \r\n\
             {body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).unwrap();

        let mut raw = String::new();
        stream.read_to_string(&mut raw).unwrap();
        let (head, body) = raw
            .split_once("\r\n\r\n")
            .unwrap_or_else(|| panic!("malformed response: {raw}"));
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| panic!("malformed status line: {head}"));
        Response {
            status,
            body: body.to_string(),
        }
    }

    pub fn get(&self, path: &str) -> Response {
        self.request("GET", path, None)
    }

    pub fn post(&self, path: &str, body: &Value) -> Response {
        self.request("POST", path, Some(&body.to_string()))
    }

    /// Submit a job and return its id.
    pub fn submit(&self, name: &str, commands: &[&str]) -> u64 {
        let response = self.post("/jobs", &json!({ "name": name, "commands": commands }));
        assert_eq!(response.status, 200, "submit failed: {}", response.body);
        response.json()["id"].as_u64().unwrap()
    }

    pub fn job(&self, id: u64) -> Value {
        let response = self.get(&format!("/jobs/{id}"));
        assert_eq!(response.status, 200, "job {id}: {}", response.body);
        response.json()
    }

    /// Wait until job `id` has `status`; returns the job.
    pub fn wait_for_status(&self, id: u64, status: &str) -> Value {
        let mut last = Value::Null;
        let reached = wait_for(SPEC_WAIT_MAX_MS, || {
            last = self.job(id);
            last["status"] == status
        });
        assert!(
            reached,
            "job {id} never reached {status}, last: {last}\nlog: {}",
            self.log()
        );
        last
    }

    /// Wait until job `id` reaches a terminal status; returns the job.
    pub fn wait_for_finish(&self, id: u64) -> Value {
        let mut last = Value::Null;
        let finished = wait_for(SPEC_WAIT_MAX_MS, || {
            last = self.job(id);
            !matches!(last["status"].as_str(), Some("idle") | Some("running"))
        });
        assert!(finished, "job {id} never finished, last: {last}\nlog: {}", self.log());
        last
    }

    pub fn job_log(&self, id: u64) -> String {
        let response = self.get(&format!("/jobs/{id}/log"));
        assert_eq!(response.status, 200, "job {id} log: {}", response.body);
        response.body
    }

    /// Send a signal (e.g. "-TERM") to the runner process.
    pub fn signal(&self, signal: &str) {
        let status = Command::new("kill")
            .args([signal, &self.pid().to_string()])
            .status()
            .unwrap();
        assert!(status.success(), "kill {signal} failed");
    }

    /// Wait for the runner to exit.
    pub fn wait_exit(&mut self, timeout_ms: u64) -> Option<ExitStatus> {
        let mut exit = None;
        wait_for(timeout_ms, || {
            exit = self.child.try_wait().unwrap();
            exit.is_some()
        });
        exit
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
