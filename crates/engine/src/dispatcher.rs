// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatcher: hands queued jobs to idle workers in submission order.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::job::Job;
use crate::pool::Shutdown;
use crate::worker::JobSlot;

/// Match each queued job with the next worker that reports idle.
///
/// Returns when shutdown begins, the queue closes, or every worker has
/// exited. Jobs left undispatched are discarded: they end as
/// `ForcedTermination` without running.
pub(crate) async fn run(
    mut queue_rx: mpsc::Receiver<Arc<Job>>,
    mut idle_rx: mpsc::Receiver<JobSlot>,
    shutdown: Shutdown,
) {
    'dispatch: loop {
        let mut job = tokio::select! {
            biased;
            _ = shutdown.graceful.cancelled() => break,
            job = queue_rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        tracing::debug!(job_id = %job.id(), "waiting for an idle worker");

        loop {
            let slot = tokio::select! {
                biased;
                _ = shutdown.graceful.cancelled() => {
                    job.discard();
                    break 'dispatch;
                }
                slot = idle_rx.recv() => slot,
            };
            let Some(slot) = slot else {
                job.discard();
                break 'dispatch;
            };
            match slot.send(job) {
                Ok(()) => break,
                // That worker stopped waiting; offer the job to the next one
                Err(returned) => job = returned,
            }
        }
    }

    queue_rx.close();
    let mut discarded = 0usize;
    while let Ok(job) = queue_rx.try_recv() {
        job.discard();
        discarded += 1;
    }
    tracing::debug!(discarded, "dispatcher stopped");
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
