// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job handlers: submit, list, show, log, stop.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use conveyor_core::JobId;
use conveyor_engine::{Job, PoolError};
use tracing::{debug, warn};

use super::{ApiError, AppState};
use crate::protocol::{JobSummary, MessageResponse, SubmitRequest, SubmitResponse};

pub(super) async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        debug!(error = %e, "rejected job submission body");
        ApiError::bad_request("Could not parse json.")
    })?;
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("No job name specified."));
    }

    match state.pool.submit(request.name, request.commands) {
        Ok(job) => Ok(Json(SubmitResponse {
            message: "Job Submitted".to_string(),
            id: job.id(),
        })),
        Err(e @ (PoolError::QueueFull { .. } | PoolError::ShuttingDown | PoolError::NotStarted)) => {
            Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
        Err(e) => Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

pub(super) async fn list(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    let jobs = state.pool.jobs();
    Json(jobs.iter().map(|job| JobSummary::from(job.as_ref())).collect())
}

pub(super) async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobSummary>, ApiError> {
    let job = find(&state, &id)?;
    Ok(Json(JobSummary::from(job.as_ref())))
}

pub(super) async fn log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = find(&state, &id)?;
    let Some(path) = job.log_path() else {
        return Err(ApiError::not_found("Job has no log yet"));
    };
    match tokio::fs::read(&path).await {
        Ok(contents) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            contents,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::not_found("Job has no log yet"))
        }
        Err(e) => {
            warn!(job_id = %job.id(), path = %path.display(), error = %e, "failed to read job log");
            Err(ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Could not read job log"))
        }
    }
}

pub(super) async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let stopped = id
        .parse::<JobId>()
        .map(|id| state.pool.stop_job(id))
        .unwrap_or(false);
    if stopped {
        Ok(Json(MessageResponse {
            message: "Stop requested".to_string(),
        }))
    } else {
        Err(ApiError::not_found("Job not found or already finished"))
    }
}

fn find(state: &AppState, id: &str) -> Result<Arc<Job>, ApiError> {
    let Ok(job_id) = id.parse::<JobId>() else {
        return Err(ApiError::bad_request(format!("Invalid job id: {id}")));
    };
    state.pool.get_job(job_id).ok_or_else(|| {
        warn!(job_id = %job_id, "job not found");
        ApiError::not_found("Job not found")
    })
}
