// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request and response bodies of the HTTP API.

use conveyor_core::{JobId, JobStatus, StatusSnapshot, WorkerId};
use conveyor_engine::Job;
use serde::{Deserialize, Serialize};

/// Body of `POST /jobs`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SubmitRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub commands: Vec<String>,
}

/// Reply to an accepted submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub message: String,
    pub id: JobId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

/// Summary of a job for `GET /jobs` and `GET /jobs/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSummary {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    /// Worker currently running the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerId>,
    pub commands: Vec<String>,
    pub snapshot: StatusSnapshot,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        let state = job.state();
        Self {
            id: job.id(),
            name: job.name().to_string(),
            status: state.status,
            worker: state.worker,
            commands: job.commands().to_vec(),
            snapshot: state.snapshot,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
