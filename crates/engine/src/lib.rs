// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Conveyor execution engine: worker pool, dispatcher, and job execution

mod dispatcher;
pub mod env;
mod error;
mod job;
mod job_logger;
pub mod log_paths;
mod pool;
mod registry;
pub mod script;
mod worker;
mod workspace;

pub use error::PoolError;
pub use job::{Job, JobState, OUTPUT_CAPACITY};
pub use job_logger::JobLogger;
pub use pool::{PoolConfig, PoolSignals, WorkerInfo, WorkerPool, DEFAULT_QUEUE_CAPACITY};
pub use registry::JobRegistry;
pub use script::{materialize, ScriptError, SCRIPT_HEADER};
