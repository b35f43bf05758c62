// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job status and status snapshots.

use crate::id::JobId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job.
///
/// `Idle → Running → {Success, Error, ForcedTermination}`. The three
/// terminal states are final; a job never leaves them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, waiting for a worker
    #[default]
    Idle,
    /// Accepted by a worker and executing
    Running,
    /// Ran to completion with exit code 0
    Success,
    /// Ran to completion with a non-zero exit code, or failed to start
    Error,
    /// Killed before it could finish (interrupt, pool force-stop, or an
    /// outside signal)
    ForcedTermination,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Error | JobStatus::ForcedTermination
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Error => write!(f, "error"),
            JobStatus::ForcedTermination => write!(f, "forced_termination"),
        }
    }
}

/// Point-in-time view of a job's subprocess.
///
/// Published on the job's output channel once per poll tick while the job
/// runs, and once more with the final status when it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Process ID, once the subprocess has been started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Exit code, set only when the process exited on its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Terminating signal, set when the process was killed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    /// True only when the process ran to completion (any exit code)
    pub complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub runtime_ms: u64,
}

impl StatusSnapshot {
    /// Snapshot for a job that has not started a process.
    pub fn pending(job_id: JobId) -> Self {
        Self {
            job_id,
            status: JobStatus::Idle,
            pid: None,
            exit_code: None,
            signal: None,
            complete: false,
            error: None,
            runtime_ms: 0,
        }
    }

    /// Snapshot for a job that finished without ever spawning a process
    /// (empty command list).
    pub fn no_op(job_id: JobId) -> Self {
        Self {
            status: JobStatus::Success,
            exit_code: Some(0),
            complete: true,
            ..Self::pending(job_id)
        }
    }

    /// Snapshot for a job whose process could not be started.
    pub fn failed_to_start(job_id: JobId, error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            error: Some(error.into()),
            ..Self::pending(job_id)
        }
    }

    /// Terminal status implied by how the process ended.
    ///
    /// A process that did not run to completion was killed, which is never
    /// reported as success or as an ordinary error.
    pub fn exit_status(&self) -> JobStatus {
        if !self.complete {
            return if self.error.is_some() && self.pid.is_none() {
                JobStatus::Error
            } else {
                JobStatus::ForcedTermination
            };
        }
        match self.exit_code {
            Some(0) => JobStatus::Success,
            _ => JobStatus::Error,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
