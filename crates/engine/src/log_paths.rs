// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared path builders for worker directories, job logs, and job scripts.
//!
//! Used by both the workers (writers) and the daemon (reader) to agree on:
//!   `<workspace_root>_<n>/`                        per-worker workspace
//!   `<workers_root>_<n>/job_<id>.log`              job output log
//!   `<workers_root>_<n>/job-scripts.d/<id>.qscript` multi-command script

use std::path::{Path, PathBuf};

use conveyor_core::JobId;

/// Subdirectory of a worker's log directory holding generated scripts.
pub const SCRIPTS_DIR: &str = "job-scripts.d";

/// Build the directory for worker `index` under `root`.
///
/// Structure: `{root}_{index}`. A trailing separator on `root` is ignored.
pub fn indexed_dir(root: &Path, index: usize) -> PathBuf {
    let mut name = root.components().as_path().as_os_str().to_os_string();
    name.push(format!("_{index}"));
    PathBuf::from(name)
}

/// Build the path to a job's output log.
///
/// Structure: `{log_dir}/job_{job_id}.log`
pub fn job_log_path(log_dir: &Path, job_id: JobId) -> PathBuf {
    log_dir.join(format!("job_{}.log", job_id))
}

/// Build the path to a job's generated script.
///
/// Structure: `{log_dir}/job-scripts.d/{job_id}.qscript`
pub fn job_script_path(log_dir: &Path, job_id: JobId) -> PathBuf {
    log_dir.join(SCRIPTS_DIR).join(format!("{}.qscript", job_id))
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;
