// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conveyor runner (conveyor)
//!
//! Serves the job API over HTTP and executes submitted jobs on a fixed pool
//! of workers.
//!
//! Shutdown: the first SIGTERM/SIGINT stops the listener and drains the
//! pool gracefully; a second signal, or the shutdown timeout, kills the
//! remaining jobs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::Path;
use std::time::Duration;

use clap::Parser;
use conveyor_daemon::lifecycle::{self, StartupResult};
use conveyor_daemon::listener::{AppState, Listener};
use conveyor_daemon::{Config, LifecycleError};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Time allowed for in-flight HTTP requests after the listener stops.
const HTTP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // --help/--version exit here, before any lock or socket is touched
    let config = Config::parse();

    let _log_guard = setup_logging(&config)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        workers = config.workers,
        addr = %config.socket_addr(),
        "starting conveyor"
    );

    let StartupResult { daemon, listener } = match lifecycle::startup(&config).await {
        Ok(result) => result,
        Err(LifecycleError::AlreadyRunning { pid }) => {
            eprintln!("conveyor is already running");
            eprintln!("  pid: {pid}");
            eprintln!("  pid file: {}", config.pid_file.display());
            std::process::exit(1);
        }
        Err(e) => {
            error!("Failed to start conveyor: {}", e);
            return Err(e.into());
        }
    };
    let mut signals = ShutdownSignals::install()?;

    let http_shutdown = CancellationToken::new();
    let mut server = {
        let token = http_shutdown.clone();
        let listener = Listener::new(
            listener,
            AppState {
                pool: daemon.pool.clone(),
            },
            config.access_log,
        );
        tokio::spawn(async move { listener.run(async move { token.cancelled().await }).await })
    };

    let mut server_done = false;
    tokio::select! {
        name = signals.next() => info!(signal = name, "received shutdown signal, stopping"),
        result = &mut server => {
            server_done = true;
            match result {
                Ok(Ok(())) => warn!("HTTP listener exited, stopping"),
                Ok(Err(e)) => error!(error = %e, "HTTP listener failed, stopping"),
                Err(e) => error!(error = %e, "HTTP listener task failed, stopping"),
            }
        }
    }

    http_shutdown.cancel();
    let outcome = lifecycle::stop_pool(&daemon.pool, config.shutdown_timeout(), async {
        signals.next().await;
    })
    .await;

    if !server_done {
        match tokio::time::timeout(HTTP_DRAIN_TIMEOUT, &mut server).await {
            Ok(Ok(Err(e))) => warn!(error = %e, "HTTP listener failed during shutdown"),
            Ok(_) => {}
            Err(_) => {
                warn!("HTTP connections still open, closing");
                server.abort();
            }
        }
    }

    lifecycle::shutdown(daemon, outcome).await;
    Ok(())
}

/// SIGTERM and SIGINT, either of which requests shutdown.
struct ShutdownSignals {
    terminate: Signal,
    interrupt: Signal,
}

impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next signal and return its name.
    async fn next(&mut self) -> &'static str {
        tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        }
    }
}

/// Log filter: `RUST_LOG` if set, else `--log-level`.
fn log_filter(config: &Config) -> Result<EnvFilter, LifecycleError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.log_level).map_err(|e| {
        LifecycleError::InvalidConfig(format!("invalid log level {:?}: {}", config.log_level, e))
    })
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*};

    let filter = log_filter(config)?;

    let Some(log_file) = &config.log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_file.file_name().ok_or_else(|| {
        LifecycleError::InvalidConfig(format!("log file {} has no file name", log_file.display()))
    })?;
    std::fs::create_dir_all(dir)?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(Some(guard))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
