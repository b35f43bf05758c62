// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared handle to a submitted job.

use std::path::PathBuf;

use conveyor_core::{JobId, JobStatus, StatusSnapshot, WorkerId};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Buffer size of a job's output channel.
///
/// Progress snapshots are dropped while the buffer is nearly full; one slot
/// is always kept free for the terminal snapshot.
pub const OUTPUT_CAPACITY: usize = 64;

/// Mutable part of a job, observed through [`Job::state`].
#[derive(Debug, Clone)]
pub struct JobState {
    pub status: JobStatus,
    /// Worker executing the job; set only while `Running`
    pub worker: Option<WorkerId>,
    /// Most recent snapshot of the job's process
    pub snapshot: StatusSnapshot,
    /// Output log, assigned when a worker accepts the job
    pub log_path: Option<PathBuf>,
}

/// A unit of work: an ordered list of shell commands plus its execution
/// state.
///
/// Shared between the submitter, the pool registry, and the worker that runs
/// it. Status moves `Idle → Running → terminal`, or straight from `Idle` to
/// `ForcedTermination` for a job that never runs, and is set to a terminal
/// value exactly once. The output channel carries snapshots to a single
/// consumer and is closed exactly once, either after the terminal snapshot
/// or (on forced abort and discarded jobs) without one.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    name: String,
    commands: Vec<String>,
    state: watch::Sender<JobState>,
    interrupt: CancellationToken,
    output_tx: Mutex<Option<mpsc::Sender<StatusSnapshot>>>,
    output_rx: Mutex<Option<mpsc::Receiver<StatusSnapshot>>>,
}

impl Job {
    pub fn new(id: JobId, name: impl Into<String>, commands: Vec<String>) -> Self {
        let (state, _) = watch::channel(JobState {
            status: JobStatus::Idle,
            worker: None,
            snapshot: StatusSnapshot::pending(id),
            log_path: None,
        });
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CAPACITY);
        Self {
            id,
            name: name.into(),
            commands,
            state,
            interrupt: CancellationToken::new(),
            output_tx: Mutex::new(Some(output_tx)),
            output_rx: Mutex::new(Some(output_rx)),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.state.borrow().status
    }

    pub fn worker(&self) -> Option<WorkerId> {
        self.state.borrow().worker
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.borrow().snapshot.clone()
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.state.borrow().log_path.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Take the receiving end of the output channel.
    ///
    /// There is a single consumer: returns `None` after the first call.
    pub fn take_output(&self) -> Option<mpsc::Receiver<StatusSnapshot>> {
        self.output_rx.lock().take()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Wait until the job reaches a terminal status and return it.
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.state.subscribe();
        let result = rx
            .wait_for(|state| state.status.is_terminal())
            .await
            .map(|state| state.status);
        result.unwrap_or_else(|_| self.status())
    }

    /// Request that the job stop.
    ///
    /// Returns `false` if the job already reached a terminal status. A
    /// running job is interrupted; a job still waiting for a worker ends as
    /// `ForcedTermination` without running.
    pub fn stop(&self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.interrupt.cancel();
        true
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.is_cancelled()
    }

    pub(crate) fn interrupted(&self) -> WaitForCancellationFuture<'_> {
        self.interrupt.cancelled()
    }

    /// `Idle → Running`. Returns `false` (and changes nothing) if the job
    /// was not idle.
    pub(crate) fn start(&self, worker: WorkerId, log_path: PathBuf) -> bool {
        self.state.send_if_modified(|state| {
            if state.status != JobStatus::Idle {
                return false;
            }
            state.status = JobStatus::Running;
            state.worker = Some(worker);
            state.snapshot.status = JobStatus::Running;
            state.log_path = Some(log_path);
            true
        })
    }

    /// Record and forward a progress snapshot of a running job.
    ///
    /// Dropped if the job is already terminal, or if the consumer has
    /// fallen behind and the channel is nearly full.
    pub(crate) fn publish(&self, snapshot: StatusSnapshot) {
        let recorded = self.state.send_if_modified(|state| {
            if state.status.is_terminal() {
                return false;
            }
            state.snapshot = snapshot.clone();
            true
        });
        if !recorded {
            return;
        }
        if let Some(tx) = self.output_tx.lock().as_ref() {
            if tx.capacity() > 1 && tx.try_send(snapshot).is_err() {
                tracing::debug!(job_id = %self.id, "dropped progress snapshot");
            }
        }
    }

    /// Set the terminal status from `snapshot` and close the output channel.
    ///
    /// The snapshot is forwarded before closing when `publish` is true. Only
    /// the first call has any effect; returns whether this call finished the
    /// job.
    pub(crate) fn finish(&self, snapshot: StatusSnapshot, publish: bool) -> bool {
        let status = snapshot.status;
        if !status.is_terminal() {
            tracing::warn!(job_id = %self.id, %status, "refusing non-terminal final status");
            return false;
        }
        let finished = self.state.send_if_modified(|state| {
            if state.status.is_terminal() {
                return false;
            }
            state.status = status;
            state.worker = None;
            state.snapshot = snapshot.clone();
            true
        });
        if !finished {
            tracing::warn!(job_id = %self.id, "job already finished");
            return false;
        }

        if let Some(tx) = self.output_tx.lock().take() {
            if publish && tx.try_send(snapshot).is_err() {
                tracing::warn!(job_id = %self.id, "could not deliver final snapshot");
            }
        }
        true
    }

    /// End a job that will never run: `ForcedTermination` with the output
    /// channel closed and no final snapshot.
    ///
    /// Used for jobs that reach a worker after shutdown began.
    pub(crate) fn discard(&self) {
        let snapshot = StatusSnapshot {
            status: JobStatus::ForcedTermination,
            ..StatusSnapshot::pending(self.id)
        };
        if self.finish(snapshot, false) {
            tracing::info!(job_id = %self.id, "discarded job, pool is shutting down");
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
