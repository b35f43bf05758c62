// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifiers and their generator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Unique identifier for a submitted job.
///
/// IDs are handed out in increasing order by [`JobIdGen`] and are never
/// reused within a process, so a larger ID always means a later submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Error returned when a string is not a valid job ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job id: {0:?}")]
pub struct ParseIdError(pub String);

impl FromStr for JobId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(JobId)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

/// Monotonic job ID generator.
///
/// Clones share the same counter, so every handle produces distinct IDs.
#[derive(Debug, Clone)]
pub struct JobIdGen {
    counter: Arc<AtomicU64>,
}

impl JobIdGen {
    /// Create a generator whose first ID is `start`.
    pub fn starting_at(start: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn next(&self) -> JobId {
        JobId(self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for JobIdGen {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
