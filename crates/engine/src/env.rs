// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Interval between status snapshots of a running job (default: 1000ms).
pub fn poll_interval() -> Duration {
    parse_duration_ms("CONVEYOR_POLL_MS")
        .filter(|d| !d.is_zero())
        .unwrap_or(Duration::from_secs(1))
}

/// How long an interrupted job may take to exit after SIGTERM before it is
/// killed (default: 5000ms).
pub fn stop_grace() -> Duration {
    parse_duration_ms("CONVEYOR_STOP_GRACE_MS").unwrap_or(Duration::from_secs(5))
}

/// How long to wait for a job's output to finish draining into its log
/// after the process exits (default: 5000ms).
pub fn drain_timeout() -> Duration {
    parse_duration_ms("CONVEYOR_DRAIN_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
