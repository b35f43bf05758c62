// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker: runs one job at a time to a terminal status.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use conveyor_adapters::{ProcessMonitor, ProcessStatus, RunningProcess, ShellCommand};
use conveyor_core::{JobId, JobStatus, StatusSnapshot};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::job::Job;
use crate::job_logger::JobLogger;
use crate::log_paths;
use crate::pool::{PoolConfig, Shutdown, WorkerInfo};
use crate::script::{self, ScriptError};
use crate::workspace;

/// Slot an idle worker offers to the dispatcher; the dispatcher fills it
/// with the next job.
pub(crate) type JobSlot = oneshot::Sender<Arc<Job>>;

/// How the race between a job's process, its interrupt, and a forced pool
/// stop was decided.
enum Outcome {
    Exited(ProcessStatus),
    Interrupted,
    Aborted,
}

pub(crate) struct Worker {
    info: WorkerInfo,
    config: Arc<PoolConfig>,
}

impl Worker {
    pub(crate) fn new(info: WorkerInfo, config: Arc<PoolConfig>) -> Self {
        Self { info, config }
    }

    /// Offer an idle slot, run the job it receives, repeat until shutdown.
    pub(crate) async fn run(self, idle_tx: mpsc::Sender<JobSlot>, shutdown: Shutdown) {
        let worker = self.info.id;
        tracing::info!(%worker, "ready to process jobs");

        loop {
            let (slot_tx, mut slot_rx) = oneshot::channel();
            tokio::select! {
                biased;
                _ = shutdown.graceful.cancelled() => break,
                sent = idle_tx.send(slot_tx) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }

            let job = tokio::select! {
                biased;
                _ = shutdown.graceful.cancelled() => {
                    // A job may have been handed over just as shutdown began
                    slot_rx.close();
                    if let Ok(job) = slot_rx.try_recv() {
                        job.discard();
                    }
                    break;
                }
                job = &mut slot_rx => match job {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            if shutdown.is_terminating() {
                job.discard();
                break;
            }
            self.process(&job, &shutdown.forced).await;
        }

        tracing::info!(%worker, "received shutdown signal, won't process any new jobs");
    }

    /// Execute `job` and leave it in a terminal status with its output
    /// channel closed.
    pub(crate) async fn process(&self, job: &Arc<Job>, forced: &CancellationToken) {
        let worker = self.info.id;
        let job_id = job.id();
        let log_path = log_paths::job_log_path(&self.info.log_dir, job_id);
        if !job.start(worker, log_path.clone()) {
            tracing::warn!(%job_id, %worker, status = %job.status(), "job is not idle, skipping");
            return;
        }
        tracing::info!(%job_id, %worker, "processing job");

        if job.is_interrupted() {
            tracing::info!(%job_id, "job stopped before it started");
            job.finish(
                StatusSnapshot {
                    status: JobStatus::ForcedTermination,
                    ..StatusSnapshot::pending(job_id)
                },
                true,
            );
            return;
        }

        if job.commands().is_empty() {
            tracing::info!(%job_id, "job has no commands");
            job.finish(StatusSnapshot::no_op(job_id), true);
            return;
        }

        if !self.config.keep_workspace {
            if let Err(e) = workspace::clear(&self.info.workspace_dir) {
                tracing::warn!(%job_id, %worker, error = %e, "failed to clean workspace");
            }
        }

        let spawned = self
            .command_for(job)
            .map_err(|e| e.to_string())
            .and_then(|cmd| cmd.spawn().map_err(|e| e.to_string()));
        let mut process = match spawned {
            Ok(process) => process,
            Err(message) => {
                tracing::error!(%job_id, %worker, error = %message, "failed to start job");
                job.finish(StatusSnapshot::failed_to_start(job_id, message), true);
                return;
            }
        };
        tracing::debug!(%job_id, pid = ?process.pid(), "job process started");

        let drain = process
            .take_output()
            .map(|output| JobLogger::new(log_path).spawn_drain(output));
        let poller_stop = CancellationToken::new();
        let poller = spawn_poller(
            Arc::clone(job),
            process.monitor(),
            self.config.poll_interval,
            poller_stop.clone(),
        );

        let outcome = tokio::select! {
            biased;
            _ = forced.cancelled() => Outcome::Aborted,
            _ = job.interrupted() => Outcome::Interrupted,
            status = process.wait() => Outcome::Exited(status),
        };

        // No progress snapshot may follow the terminal one
        poller_stop.cancel();
        if let Err(e) = poller.await {
            tracing::warn!(%job_id, error = %e, "status poller failed");
        }

        let (status, stopped, publish) = match outcome {
            Outcome::Exited(status) => (status, false, true),
            Outcome::Interrupted => {
                tracing::info!(%job_id, %worker, "requested to stop job");
                let (status, publish) = self.interrupt(&mut process, forced).await;
                (status, true, publish)
            }
            Outcome::Aborted => {
                tracing::warn!(%job_id, %worker, "forcefully stopping job");
                process.kill().await;
                (process.wait().await, true, false)
            }
        };
        // The shell is gone; background commands it left must not outlive the job
        if process.kill_group().await {
            tracing::warn!(%job_id, %worker, "killed processes left behind by job");
        }
        self.finish_drain(job_id, drain).await;

        let mut snapshot = final_snapshot(job_id, &status);
        if stopped {
            // Even if the process trapped the signal and exited cleanly
            snapshot.status = JobStatus::ForcedTermination;
        }
        match snapshot.status {
            JobStatus::ForcedTermination => {
                tracing::warn!(%job_id, %worker, signal = ?snapshot.signal, "forced termination of job")
            }
            status => {
                tracing::info!(%job_id, %worker, %status, exit_code = ?snapshot.exit_code, "job completed")
            }
        }
        job.finish(snapshot, publish);
    }

    /// Command line for a non-empty job: a single command runs directly,
    /// several run as a generated script.
    fn command_for(&self, job: &Job) -> Result<ShellCommand, ScriptError> {
        let command = match job.commands() {
            [single] => ShellCommand::bash(single),
            commands => {
                let path = log_paths::job_script_path(&self.info.log_dir, job.id());
                ShellCommand::script(&script::materialize(&path, commands)?)
            }
        };
        Ok(command.cwd(&self.info.workspace_dir))
    }

    /// SIGTERM, then SIGKILL after the grace period.
    ///
    /// Returns the final status and whether to publish it; a forced pool
    /// stop during the grace period kills immediately and suppresses the
    /// final snapshot.
    async fn interrupt(&self, process: &mut RunningProcess, forced: &CancellationToken) -> (ProcessStatus, bool) {
        if let Err(e) = process.terminate().await {
            tracing::warn!(pid = ?process.pid(), error = %e, "failed to signal job, killing");
            process.kill().await;
        }

        tokio::select! {
            biased;
            _ = forced.cancelled() => {
                process.kill().await;
                (process.wait().await, false)
            }
            waited = tokio::time::timeout(self.config.stop_grace, process.wait()) => match waited {
                Ok(status) => (status, true),
                Err(_) => {
                    tracing::warn!(pid = ?process.pid(), grace = ?self.config.stop_grace, "job ignored SIGTERM, killing");
                    process.kill().await;
                    (process.wait().await, true)
                }
            },
        }
    }

    async fn finish_drain(&self, job_id: JobId, drain: Option<JoinHandle<io::Result<u64>>>) {
        let Some(mut drain) = drain else {
            return;
        };
        match tokio::time::timeout(self.config.drain_timeout, &mut drain).await {
            Ok(Ok(Ok(lines))) => tracing::debug!(%job_id, lines, "job output drained"),
            Ok(Ok(Err(e))) => tracing::warn!(%job_id, error = %e, "failed to write job log"),
            Ok(Err(e)) => tracing::warn!(%job_id, error = %e, "job log task failed"),
            Err(_) => {
                tracing::warn!(%job_id, "job output still open, abandoning log drain");
                drain.abort();
            }
        }
    }
}

/// Publish a progress snapshot every `interval` until `stop` fires.
fn spawn_poller(
    job: Arc<Job>,
    monitor: ProcessMonitor,
    interval: Duration,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = StatusSnapshot {
                        status: JobStatus::Running,
                        ..final_snapshot(job.id(), &monitor.status())
                    };
                    tracing::debug!(job_id = %job.id(), pid = ?snapshot.pid, runtime_ms = snapshot.runtime_ms, "job status");
                    job.publish(snapshot);
                }
            }
        }
    })
}

/// Snapshot of `status`, with the job status derived from how the process
/// ended.
fn final_snapshot(job_id: JobId, status: &ProcessStatus) -> StatusSnapshot {
    let mut snapshot = StatusSnapshot {
        job_id,
        status: JobStatus::Running,
        pid: status.pid,
        exit_code: status.exit_code,
        signal: status.signal,
        complete: status.complete,
        error: status.error.clone(),
        runtime_ms: u64::try_from(status.runtime.as_millis()).unwrap_or(u64::MAX),
    };
    snapshot.status = snapshot.exit_status();
    snapshot
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
