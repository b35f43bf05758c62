// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool: job submission, lookup, and two-tier shutdown.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conveyor_core::{JobId, JobIdGen, WorkerId};
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::dispatcher;
use crate::env;
use crate::error::PoolError;
use crate::job::Job;
use crate::log_paths;
use crate::registry::JobRegistry;
use crate::worker::Worker;
use crate::workspace;

/// Default bound on jobs waiting for a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Worker pool settings.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Interval between progress snapshots of a running job
    pub poll_interval: Duration,
    /// Time an interrupted job gets to exit after SIGTERM
    pub stop_grace: Duration,
    /// Time allowed for output to finish draining after a job's process exits
    pub drain_timeout: Duration,
    /// Keep workspace contents between jobs instead of emptying it
    pub keep_workspace: bool,
}

impl PoolConfig {
    /// Settings for `workers` workers, with timings from the environment.
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: env::poll_interval(),
            stop_grace: env::stop_grace(),
            drain_timeout: env::drain_timeout(),
            keep_workspace: false,
        }
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn keep_workspace(mut self, keep: bool) -> Self {
        self.keep_workspace = keep;
        self
    }
}

/// Directories assigned to a worker at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    pub id: WorkerId,
    pub workspace_dir: PathBuf,
    pub log_dir: PathBuf,
}

/// Completion notifications returned by [`WorkerPool::start`].
///
/// `graceful_done` fires when [`WorkerPool::stop`] finishes and
/// `forced_done` when [`WorkerPool::force_stop`] finishes. Each fires at
/// most once. The sender of the tier that was never used is dropped when
/// the pool is.
#[derive(Debug)]
pub struct PoolSignals {
    pub graceful_done: oneshot::Receiver<()>,
    pub forced_done: oneshot::Receiver<()>,
}

/// Termination state shared by the pool, its workers, and the dispatcher.
///
/// `forced` cancels `graceful` too, so waiting on `graceful` covers both
/// tiers.
#[derive(Debug, Clone)]
pub(crate) struct Shutdown {
    pub(crate) graceful: CancellationToken,
    pub(crate) forced: CancellationToken,
    terminating: Arc<AtomicBool>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        let forced = CancellationToken::new();
        Self {
            graceful: forced.child_token(),
            forced,
            terminating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the termination flag. Returns `true` for the call that set it.
    pub(crate) fn begin(&self) -> bool {
        !self.terminating.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct DoneSenders {
    graceful: Option<oneshot::Sender<()>>,
    forced: Option<oneshot::Sender<()>>,
}

#[derive(Debug)]
struct PoolInner {
    config: PoolConfig,
    ids: JobIdGen,
    registry: JobRegistry,
    shutdown: Shutdown,
    tracker: TaskTracker,
    queue_tx: Mutex<Option<mpsc::Sender<Arc<Job>>>>,
    workers: Mutex<Vec<WorkerInfo>>,
    done: Mutex<DoneSenders>,
}

/// A fixed set of workers executing submitted jobs.
///
/// Cheap to clone; clones share the same pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                ids: JobIdGen::default(),
                registry: JobRegistry::new(),
                shutdown: Shutdown::new(),
                tracker: TaskTracker::new(),
                queue_tx: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
                done: Mutex::new(DoneSenders::default()),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Create worker directories and launch the workers and the dispatcher.
    ///
    /// Worker `n` (1-based) works in `<workspace_root>_<n>` and logs to
    /// `<workers_root>_<n>`. Must be called from within a tokio runtime.
    pub fn start(&self, workspace_root: &Path, workers_root: &Path) -> Result<PoolSignals, PoolError> {
        let config = &self.inner.config;
        if config.workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        if self.inner.shutdown.is_terminating() {
            return Err(PoolError::ShuttingDown);
        }

        let mut queue_slot = self.inner.queue_tx.lock();
        if queue_slot.is_some() {
            return Err(PoolError::AlreadyStarted);
        }

        let mut infos = Vec::with_capacity(config.workers);
        for index in 1..=config.workers {
            let info = WorkerInfo {
                id: WorkerId::new(index),
                workspace_dir: log_paths::indexed_dir(workspace_root, index),
                log_dir: log_paths::indexed_dir(workers_root, index),
            };
            for dir in [&info.workspace_dir, &info.log_dir] {
                workspace::provision(dir).map_err(|source| PoolError::Provision {
                    path: dir.clone(),
                    source,
                })?;
            }
            infos.push(info);
        }

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (idle_tx, idle_rx) = mpsc::channel(config.workers);
        let settings = Arc::new(config.clone());

        tracing::info!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "starting worker pool"
        );
        for info in &infos {
            tracing::info!(worker = %info.id, workspace = %info.workspace_dir.display(), "starting worker");
            let worker = Worker::new(info.clone(), Arc::clone(&settings));
            self.inner
                .tracker
                .spawn(worker.run(idle_tx.clone(), self.inner.shutdown.clone()));
        }
        drop(idle_tx);
        self.inner
            .tracker
            .spawn(dispatcher::run(queue_rx, idle_rx, self.inner.shutdown.clone()));
        // Nothing else joins; wait() resolves once the workers and the
        // dispatcher have exited.
        self.inner.tracker.close();

        let (graceful_tx, graceful_rx) = oneshot::channel();
        let (forced_tx, forced_rx) = oneshot::channel();
        *self.inner.done.lock() = DoneSenders {
            graceful: Some(graceful_tx),
            forced: Some(forced_tx),
        };
        *self.inner.workers.lock() = infos;
        *queue_slot = Some(queue_tx);

        Ok(PoolSignals {
            graceful_done: graceful_rx,
            forced_done: forced_rx,
        })
    }

    /// Enqueue a job for execution.
    ///
    /// Never blocks: a full queue is reported as [`PoolError::QueueFull`].
    pub fn submit(&self, name: impl Into<String>, commands: Vec<String>) -> Result<Arc<Job>, PoolError> {
        if self.inner.shutdown.is_terminating() {
            return Err(PoolError::ShuttingDown);
        }
        let queue = self
            .inner
            .queue_tx
            .lock()
            .clone()
            .ok_or(PoolError::NotStarted)?;

        let job = Arc::new(Job::new(self.inner.ids.next(), name, commands));
        self.inner.registry.insert(Arc::clone(&job));

        match queue.try_send(Arc::clone(&job)) {
            Ok(()) => {
                tracing::info!(
                    job_id = %job.id(),
                    name = job.name(),
                    commands = job.commands().len(),
                    "job submitted"
                );
                Ok(job)
            }
            Err(TrySendError::Full(_)) => {
                self.inner.registry.remove(job.id());
                let capacity = self.inner.config.queue_capacity;
                tracing::warn!(job_id = %job.id(), capacity, "job queue full, rejecting job");
                Err(PoolError::QueueFull { capacity })
            }
            Err(TrySendError::Closed(_)) => {
                self.inner.registry.remove(job.id());
                Err(PoolError::ShuttingDown)
            }
        }
    }

    pub fn get_job(&self, id: JobId) -> Option<Arc<Job>> {
        self.inner.registry.get(id)
    }

    /// All known jobs, oldest first.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.inner.registry.list()
    }

    /// Forget jobs that reached a terminal status. Returns how many.
    pub fn prune_finished(&self) -> usize {
        self.inner.registry.prune_finished()
    }

    /// Directories of the started workers (empty before start).
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.inner.workers.lock().clone()
    }

    /// Request that a job stop.
    ///
    /// Returns `false` if the job is unknown or already finished.
    pub fn stop_job(&self, id: JobId) -> bool {
        let Some(job) = self.inner.registry.get(id) else {
            tracing::warn!(job_id = %id, "cannot find job to stop");
            return false;
        };
        if job.stop() {
            tracing::info!(job_id = %id, status = %job.status(), "stop requested");
            true
        } else {
            tracing::info!(job_id = %id, status = %job.status(), "job already finished");
            false
        }
    }

    pub fn is_terminating(&self) -> bool {
        self.inner.shutdown.is_terminating()
    }

    /// Stop accepting jobs and wait for running jobs to finish.
    ///
    /// Jobs still queued are discarded and end as `ForcedTermination`.
    /// Resolves (and fires `graceful_done`) once every worker and the
    /// dispatcher have exited.
    pub async fn stop(&self) {
        if self.inner.shutdown.begin() {
            tracing::info!("stopping worker pool, waiting for running jobs");
        }
        self.inner.shutdown.graceful.cancel();
        self.close_and_wait().await;

        if let Some(done) = self.inner.done.lock().graceful.take() {
            let _ = done.send(());
        }
        tracing::info!("worker pool stopped");
    }

    /// Abort running jobs and wait for every worker to exit.
    ///
    /// Processes are killed; their jobs end as `ForcedTermination` with the
    /// output channel closed and no final snapshot. Fires `forced_done`.
    pub async fn force_stop(&self) {
        if self.inner.shutdown.begin() {
            tracing::warn!("force stopping worker pool");
        } else {
            tracing::warn!("escalating to forced stop");
        }
        self.inner.shutdown.forced.cancel();
        self.close_and_wait().await;

        if let Some(done) = self.inner.done.lock().forced.take() {
            let _ = done.send(());
        }
        tracing::warn!("worker pool force stopped");
    }

    async fn close_and_wait(&self) {
        self.inner.queue_tx.lock().take();
        // Covers a pool that was never started
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
