// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line and environment configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use conveyor_engine::{PoolConfig, DEFAULT_QUEUE_CAPACITY};

/// Self-hosted CI runner: executes shell command jobs on a pool of workers
#[derive(Parser, Debug, Clone)]
#[command(name = "conveyor", version, about)]
pub struct Config {
    /// Default log filter (overridden by RUST_LOG)
    #[arg(long, env = "CONVEYOR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, env = "CONVEYOR_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log every HTTP request
    #[arg(
        long,
        env = "CONVEYOR_ACCESS_LOG",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub access_log: bool,

    /// HTTP port
    #[arg(long, env = "CONVEYOR_SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address to listen on
    #[arg(long, env = "CONVEYOR_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// PID file, locked while the runner is up
    #[arg(long, env = "CONVEYOR_PID_FILE", default_value = "conveyor.pid")]
    pub pid_file: PathBuf,

    /// Number of workers
    #[arg(long, env = "CONVEYOR_WORKERS", default_value_t = 2, value_parser = at_least_one)]
    pub workers: usize,

    /// Workspace root; worker N works in <DIR>_N [default: ./workspace]
    #[arg(long, env = "CONVEYOR_WORKSPACE_DIR")]
    pub workspace_dir: Option<PathBuf>,

    /// Log root; worker N logs to <DIR>_N [default: ./worker]
    #[arg(long, env = "CONVEYOR_WORKERS_DIR")]
    pub workers_dir: Option<PathBuf>,

    /// Jobs that may wait for a worker before submissions are refused
    #[arg(
        long,
        env = "CONVEYOR_QUEUE_CAPACITY",
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        value_parser = at_least_one
    )]
    pub queue_capacity: usize,

    /// Keep workspace contents between jobs
    #[arg(long, env = "CONVEYOR_KEEP_WORKSPACE")]
    pub keep_workspace: bool,

    /// Seconds to wait for running jobs on shutdown before killing them
    #[arg(long, env = "CONVEYOR_SHUTDOWN_TIMEOUT_SECS", default_value_t = 45)]
    pub shutdown_timeout_secs: u64,
}

fn at_least_one(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Workspace root, defaulting to `./workspace`.
    pub fn workspace_root(&self) -> std::io::Result<PathBuf> {
        resolve_dir(self.workspace_dir.as_ref(), "workspace")
    }

    /// Worker log root, defaulting to `./worker`.
    pub fn workers_root(&self) -> std::io::Result<PathBuf> {
        resolve_dir(self.workers_dir.as_ref(), "worker")
    }

    /// Pool settings; timings come from the environment.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.workers)
            .queue_capacity(self.queue_capacity)
            .keep_workspace(self.keep_workspace)
    }
}

fn resolve_dir(dir: Option<&PathBuf>, default: &str) -> std::io::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match dir {
        Some(dir) => cwd.join(dir),
        None => cwd.join(default),
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
