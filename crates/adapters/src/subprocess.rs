// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers
//!
//! A job's command runs as a child process leading its own process group.
//! The caller receives the child's stdout/stderr pipes; a background task
//! owns the child, reaps it, and publishes the final [`ProcessStatus`].
//! Signals are delivered to the whole group so that commands spawned by the
//! shell are stopped along with it.

use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{oneshot, watch};

/// Default timeout for delivering a signal through `kill`.
pub const SIGNAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Errors from subprocess operations
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to signal process group {pid}: {message}")]
    Signal { pid: u32, message: String },
}

/// State of a subprocess, either live or final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatus {
    pub pid: Option<u32>,
    /// Exit code, present only if the process exited on its own
    pub exit_code: Option<i32>,
    /// Signal that terminated the process, if any
    pub signal: Option<i32>,
    /// The process has exited and been reaped
    pub finished: bool,
    /// The process ran to completion (any exit code)
    pub complete: bool,
    pub error: Option<String>,
    pub runtime: Duration,
}

impl ProcessStatus {
    fn running(pid: Option<u32>, runtime: Duration) -> Self {
        Self {
            pid,
            exit_code: None,
            signal: None,
            finished: false,
            complete: false,
            error: None,
            runtime,
        }
    }

    fn exited(pid: Option<u32>, exit: ExitStatus, runtime: Duration) -> Self {
        let exit_code = exit.code();
        Self {
            pid,
            exit_code,
            signal: exit.signal(),
            finished: true,
            complete: exit_code.is_some(),
            error: None,
            runtime,
        }
    }

    fn lost(pid: Option<u32>, error: impl Into<String>, runtime: Duration) -> Self {
        Self {
            error: Some(error.into()),
            finished: true,
            ..Self::running(pid, runtime)
        }
    }
}

/// Command line for a job subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// `bash -c <command>`
    pub fn bash(command: &str) -> Self {
        Self::new("bash").arg("-c").arg(command)
    }

    /// `bash <script>`
    pub fn script(path: &Path) -> Self {
        Self::new("bash").arg(path.display().to_string())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn program(&self) -> &str {
        &self.program
    }

    #[cfg(test)]
    pub(crate) fn args(&self) -> &[String] {
        &self.args
    }

    #[cfg(test)]
    pub(crate) fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }

    /// Start the command without waiting for it.
    ///
    /// Must be called from within a tokio runtime: the child is handed to a
    /// background task that reaps it.
    pub fn spawn(&self) -> Result<RunningProcess, ProcessError> {
        let mut child = self.build().spawn().map_err(|source| ProcessError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let started_at = Instant::now();
        let pid = child.id();
        let output = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => Some(ProcessOutput { stdout, stderr }),
            _ => None,
        };

        let (exit_tx, exit_rx) = watch::channel(None);
        let (kill_tx, kill_rx) = oneshot::channel();
        spawn_reaper(child, pid, started_at, kill_rx, exit_tx);

        tracing::debug!(program = %self.program, pid = ?pid, "process started");

        Ok(RunningProcess {
            monitor: ProcessMonitor {
                pid,
                started_at,
                exit: exit_rx.clone(),
            },
            exit: exit_rx,
            kill_tx: Some(kill_tx),
            output,
        })
    }
}

/// The two output pipes of a running process.
#[derive(Debug)]
pub struct ProcessOutput {
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Read-only, cloneable view of a process's status.
#[derive(Debug, Clone)]
pub struct ProcessMonitor {
    pid: Option<u32>,
    started_at: Instant,
    exit: watch::Receiver<Option<ProcessStatus>>,
}

impl ProcessMonitor {
    pub fn status(&self) -> ProcessStatus {
        if let Some(status) = self.exit.borrow().as_ref() {
            return status.clone();
        }
        ProcessStatus::running(self.pid, self.started_at.elapsed())
    }

    pub fn is_finished(&self) -> bool {
        self.exit.borrow().is_some()
    }
}

/// Handle to a started subprocess.
///
/// Dropping the handle kills the process if it is still running.
#[derive(Debug)]
pub struct RunningProcess {
    monitor: ProcessMonitor,
    exit: watch::Receiver<Option<ProcessStatus>>,
    kill_tx: Option<oneshot::Sender<()>>,
    output: Option<ProcessOutput>,
}

impl RunningProcess {
    pub fn pid(&self) -> Option<u32> {
        self.monitor.pid
    }

    pub fn monitor(&self) -> ProcessMonitor {
        self.monitor.clone()
    }

    pub fn status(&self) -> ProcessStatus {
        self.monitor.status()
    }

    /// Take the stdout/stderr pipes. Returns `None` after the first call.
    pub fn take_output(&mut self) -> Option<ProcessOutput> {
        self.output.take()
    }

    /// Wait for the process to exit and return its final status.
    ///
    /// Cancel-safe, and may be awaited again after the process was signalled.
    pub async fn wait(&mut self) -> ProcessStatus {
        let result = self
            .exit
            .wait_for(Option::is_some)
            .await
            .map(|status| status.clone());
        match result {
            Ok(Some(status)) => status,
            _ => ProcessStatus::lost(
                self.monitor.pid,
                "process reaper exited without a status",
                self.monitor.started_at.elapsed(),
            ),
        }
    }

    /// Ask the process group to stop (SIGTERM).
    ///
    /// A no-op if the process already exited.
    pub async fn terminate(&self) -> Result<(), ProcessError> {
        match self.monitor.pid {
            Some(pid) if !self.monitor.is_finished() => signal_group(pid, "-15").await,
            _ => Ok(()),
        }
    }

    /// Kill the process group immediately (SIGKILL).
    pub async fn kill(&mut self) {
        if let Some(pid) = self.monitor.pid.filter(|_| !self.monitor.is_finished()) {
            if let Err(e) = signal_group(pid, "-9").await {
                tracing::debug!(pid, error = %e, "group kill failed, killing child only");
            }
        }
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }

    /// SIGKILL whatever is left of the process group once the shell has
    /// exited.
    ///
    /// Background commands started by the job would otherwise outlive it and
    /// hold the output pipes open. Returns `true` if any process was left.
    pub async fn kill_group(&self) -> bool {
        let Some(pid) = self.monitor.pid else {
            return false;
        };
        match signal_group(pid, "-9").await {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!(pid, error = %e, "process group already empty");
                false
            }
        }
    }
}

/// Own the child until it exits, publishing its final status.
///
/// A message on (or drop of) `kill_rx` kills the child first.
fn spawn_reaper(
    mut child: Child,
    pid: Option<u32>,
    started_at: Instant,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<Option<ProcessStatus>>,
) {
    tokio::spawn(async move {
        let waited = tokio::select! {
            result = child.wait() => result,
            _ = kill_rx => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(pid = ?pid, error = %e, "start_kill failed");
                }
                child.wait().await
            }
        };

        let runtime = started_at.elapsed();
        let status = match waited {
            Ok(exit) => ProcessStatus::exited(pid, exit, runtime),
            Err(e) => ProcessStatus::lost(pid, e.to_string(), runtime),
        };
        tracing::debug!(pid = ?pid, exit_code = ?status.exit_code, signal = ?status.signal, "process reaped");
        exit_tx.send_replace(Some(status));
    });
}

/// Send a signal to a whole process group via `kill`.
async fn signal_group(pid: u32, signal: &str) -> Result<(), ProcessError> {
    let mut cmd = Command::new("kill");
    cmd.args([signal, "--", &format!("-{}", pid)])
        .stdin(Stdio::null());

    let output = run_with_timeout(cmd, SIGNAL_TIMEOUT, "kill")
        .await
        .map_err(|message| ProcessError::Signal { pid, message })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ProcessError::Signal {
            pid,
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
