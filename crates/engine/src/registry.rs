// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lookup table of submitted jobs.

use std::collections::BTreeMap;
use std::sync::Arc;

use conveyor_core::JobId;
use parking_lot::Mutex;

use crate::job::Job;

/// Jobs by ID, for status queries and stop requests.
///
/// Jobs stay registered after they finish until [`prune_finished`] removes
/// them.
///
/// [`prune_finished`]: JobRegistry::prune_finished
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<BTreeMap<JobId, Arc<Job>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Arc<Job>) {
        self.jobs.lock().insert(job.id(), job);
    }

    pub fn get(&self, id: JobId) -> Option<Arc<Job>> {
        self.jobs.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: JobId) -> Option<Arc<Job>> {
        self.jobs.lock().remove(&id)
    }

    /// All registered jobs, oldest first.
    pub fn list(&self) -> Vec<Arc<Job>> {
        self.jobs.lock().values().cloned().collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Drop jobs in a terminal status. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !job.is_terminal());
        before - jobs.len()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
