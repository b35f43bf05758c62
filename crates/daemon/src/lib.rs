// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conveyor daemon library
//!
//! Configuration, process lifecycle, and the HTTP listener behind the
//! `conveyor` binary. The wire types in [`protocol`] are usable by clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod lifecycle;
pub mod listener;
pub mod protocol;

pub use config::Config;
pub use lifecycle::{Daemon, LifecycleError, PidLock, StartupResult, StopOutcome};
pub use protocol::{
    ErrorResponse, HealthResponse, JobSummary, MessageResponse, SubmitRequest, SubmitResponse,
};
