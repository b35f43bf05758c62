// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner lifecycle: PID lock, startup, and two-tier shutdown.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use conveyor_engine::{PoolError, PoolSignals, WorkerPool};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("conveyor is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("Failed to acquire lock: {0}")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(SocketAddr, #[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive lock on the PID file, held for the life of the process.
///
/// The file holds the owner's PID. It is removed by [`release`]; the lock
/// itself is dropped with the handle.
///
/// [`release`]: PidLock::release
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    file: File,
}

impl PidLock {
    pub fn acquire(path: &Path) -> Result<Self, LifecycleError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        // Open without truncating so a running owner's PID survives a failed
        // attempt.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        if let Err(e) = file.try_lock_exclusive() {
            let mut contents = String::new();
            let _ = file.read_to_string(&mut contents);
            return Err(match contents.trim().parse::<u32>() {
                Ok(pid) => LifecycleError::AlreadyRunning { pid },
                Err(_) => LifecycleError::LockFailed(e),
            });
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the PID file and drop the lock.
    pub fn release(self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove PID file");
        }
    }
}

/// A started runner.
#[derive(Debug)]
pub struct Daemon {
    pub pool: WorkerPool,
    pub signals: PoolSignals,
    pid_lock: PidLock,
}

impl Daemon {
    pub fn pid_file(&self) -> &Path {
        self.pid_lock.path()
    }
}

/// Result of startup: the daemon and the socket to serve its API on.
#[derive(Debug)]
pub struct StartupResult {
    pub daemon: Daemon,
    pub listener: TcpListener,
}

/// Which shutdown tier finished the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Graceful,
    Forced,
}

/// Acquire the PID lock, bind the listener, and start the workers.
///
/// On failure nothing is left running and the PID file is removed (unless
/// another instance owns it).
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    let pid_lock = PidLock::acquire(&config.pid_file)?;
    info!(pid = std::process::id(), pid_file = %config.pid_file.display(), "acquired PID lock");

    match startup_inner(config).await {
        Ok((pool, signals, listener)) => Ok(StartupResult {
            daemon: Daemon {
                pool,
                signals,
                pid_lock,
            },
            listener,
        }),
        Err(e) => {
            pid_lock.release();
            Err(e)
        }
    }
}

async fn startup_inner(
    config: &Config,
) -> Result<(WorkerPool, PoolSignals, TcpListener), LifecycleError> {
    if config.workers == 0 {
        return Err(LifecycleError::InvalidConfig(
            "workers must be at least 1".to_string(),
        ));
    }
    if config.queue_capacity == 0 {
        return Err(LifecycleError::InvalidConfig(
            "queue capacity must be at least 1".to_string(),
        ));
    }
    let workspace_root = config.workspace_root()?;
    let workers_root = config.workers_root()?;

    // Bind before starting workers so a port conflict leaves nothing to stop
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| LifecycleError::BindFailed(addr, e))?;

    let pool = WorkerPool::new(config.pool_config());
    let signals = pool.start(&workspace_root, &workers_root)?;

    Ok((pool, signals, listener))
}

/// Stop the pool gracefully, escalating to a forced stop when `timeout`
/// elapses or `escalate` resolves first.
pub async fn stop_pool<F>(pool: &WorkerPool, timeout: Duration, escalate: F) -> StopOutcome
where
    F: Future<Output = ()>,
{
    tokio::select! {
        _ = pool.stop() => StopOutcome::Graceful,
        _ = tokio::time::sleep(timeout) => {
            warn!(timeout_secs = timeout.as_secs(), "running jobs did not finish in time, forcing shutdown");
            pool.force_stop().await;
            StopOutcome::Forced
        }
        _ = escalate => {
            warn!("received second shutdown signal, forcing shutdown");
            pool.force_stop().await;
            StopOutcome::Forced
        }
    }
}

/// Wait for the done signal of the tier that finished, then release the
/// PID file.
pub async fn shutdown(daemon: Daemon, outcome: StopOutcome) {
    let Daemon {
        signals, pid_lock, ..
    } = daemon;
    let done = match outcome {
        StopOutcome::Graceful => signals.graceful_done,
        StopOutcome::Forced => signals.forced_done,
    };
    if done.await.is_err() {
        warn!(?outcome, "worker pool dropped without signalling completion");
    }

    pid_lock.release();
    info!(?outcome, "conveyor shutdown complete");
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
