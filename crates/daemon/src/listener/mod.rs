// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP listener for the job API.
//!
//! Handlers only touch the worker pool's public operations; job execution
//! never waits on a request.

mod jobs;

use std::future::Future;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use conveyor_engine::WorkerPool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::protocol::{ErrorResponse, HealthResponse};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pool: WorkerPool,
}

/// Build the API router.
///
/// With `access_log`, every request is logged at info level.
pub fn router(state: AppState, access_log: bool) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/jobs", get(jobs::list).post(jobs::submit))
        .route("/jobs/:id", get(jobs::show))
        .route("/jobs/:id/log", get(jobs::log))
        .route("/jobs/:id/stop", post(jobs::stop))
        .with_state(state);

    if access_log {
        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    } else {
        router
    }
}

/// Serves the API until shutdown.
pub struct Listener {
    socket: TcpListener,
    app: Router,
}

impl Listener {
    pub fn new(socket: TcpListener, state: AppState, access_log: bool) -> Self {
        Self {
            socket,
            app: router(state, access_log),
        }
    }

    /// Accept connections until `shutdown` resolves, then stop accepting
    /// and let in-flight requests finish.
    pub async fn run<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = self.socket.local_addr() {
            info!(%addr, "listening for HTTP requests");
        }
        axum::serve(self.socket, self.app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// An error reply: status code plus `{"error": message}`.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
