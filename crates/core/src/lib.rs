// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! conveyor-core: data model shared by the conveyor engine and daemon

pub mod id;
pub mod job;
pub mod worker;

pub use id::{JobId, JobIdGen, ParseIdError};
pub use job::{JobStatus, StatusSnapshot};
pub use worker::WorkerId;
