// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the worker pool

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned synchronously by [`crate::WorkerPool`] operations.
///
/// Failures of an individual job are never reported here; they surface as
/// the job's terminal status.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,
    #[error("worker pool already started")]
    AlreadyStarted,
    #[error("worker pool not started")]
    NotStarted,
    #[error("worker pool is shutting down")]
    ShuttingDown,
    #[error("job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("failed to provision {}: {source}", path.display())]
    Provision {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
