// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide job lookup for monitoring collaborators and cross-runtime
//! posts.

use crate::executor::JobExecutor;
use parking_lot::Mutex;
use rlx_core::{FlowId, JobContext, JobId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;

/// How often the sweeper runs, and how long completed jobs are retained
/// after completion before eviction.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

struct JobEntry {
    context: Weak<JobContext>,
    executor: Weak<JobExecutor>,
}

#[derive(Default)]
struct JobRegistryInner {
    jobs: HashMap<JobId, JobEntry>,
    by_flow: HashMap<FlowId, Vec<JobId>>,
    completed: HashMap<JobId, Instant>,
}

/// Weak-referenced registry of every job in the process, keyed by job id
/// and flow id.
///
/// Holding only weak references keeps finished jobs collectable; a
/// background sweeper evicts jobs marked completed longer than the
/// retention window ago and prunes dead entries. The sweep body runs
/// under a try-lock and skips a contended cycle rather than ever blocking.
#[derive(Default)]
pub struct JobRegistry {
    inner: Mutex<JobRegistryInner>,
    sweeper_started: AtomicBool,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, context: &Arc<JobContext>, executor: &Arc<JobExecutor>) {
        let mut inner = self.inner.lock();
        inner.jobs.insert(
            context.job_id().clone(),
            JobEntry { context: Arc::downgrade(context), executor: Arc::downgrade(executor) },
        );
        inner
            .by_flow
            .entry(context.flow_id().clone())
            .or_default()
            .push(context.job_id().clone());
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<JobContext>> {
        let mut inner = self.inner.lock();
        match inner.jobs.get(job_id).and_then(|e| e.context.upgrade()) {
            Some(context) => Some(context),
            None => {
                Self::remove_locked(&mut inner, job_id);
                None
            }
        }
    }

    /// Context plus executor, both still alive (used to rebuild a job
    /// handle for cross-runtime posts).
    pub(crate) fn entry(&self, job_id: &str) -> Option<(Arc<JobContext>, Arc<JobExecutor>)> {
        let inner = self.inner.lock();
        let entry = inner.jobs.get(job_id)?;
        Some((entry.context.upgrade()?, entry.executor.upgrade()?))
    }

    pub fn get_by_flow(&self, flow_id: &str) -> Vec<Arc<JobContext>> {
        let inner = self.inner.lock();
        inner
            .by_flow
            .get(flow_id)
            .map(|job_ids| {
                job_ids
                    .iter()
                    .filter_map(|id| inner.jobs.get(id).and_then(|e| e.context.upgrade()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn list_all(&self) -> Vec<Arc<JobContext>> {
        self.inner.lock().jobs.values().filter_map(|e| e.context.upgrade()).collect()
    }

    /// Record a completion timestamp so the sweeper can evict the job once
    /// the retention window passes.
    pub fn mark_completed(&self, job_id: &JobId) {
        self.inner.lock().completed.insert(job_id.clone(), Instant::now());
        tracing::debug!(job_id = %job_id, "job marked completed for registry cleanup");
    }

    /// One sweep: evict expired completed jobs, prune dead weak refs.
    /// Never blocks — a contended registry skips the cycle.
    pub fn sweep(&self) {
        let Some(mut inner) = self.inner.try_lock() else {
            return;
        };
        let expired: Vec<JobId> = inner
            .completed
            .iter()
            .filter(|(_, completed_at)| completed_at.elapsed() >= SWEEP_INTERVAL)
            .map(|(id, _)| id.clone())
            .collect();
        for job_id in &expired {
            Self::remove_locked(&mut inner, job_id.as_str());
        }

        let dead: Vec<JobId> = inner
            .jobs
            .iter()
            .filter(|(_, entry)| entry.context.strong_count() == 0)
            .map(|(id, _)| id.clone())
            .collect();
        for job_id in &dead {
            Self::remove_locked(&mut inner, job_id.as_str());
        }

        if !expired.is_empty() || !dead.is_empty() {
            tracing::debug!(
                expired = expired.len(),
                dead = dead.len(),
                "swept job registry"
            );
        }
    }

    fn remove_locked(inner: &mut JobRegistryInner, job_id: &str) {
        inner.jobs.remove(job_id);
        inner.completed.remove(job_id);
        inner.by_flow.retain(|_, job_ids| {
            job_ids.retain(|id| id.as_str() != job_id);
            !job_ids.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().jobs.is_empty()
    }

    /// Drop everything (tests).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.jobs.clear();
        inner.by_flow.clear();
        inner.completed.clear();
    }

    fn ensure_sweeper(&'static self) {
        if self.sweeper_started.load(Ordering::SeqCst) {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            // No runtime yet; try again on a later access.
            return;
        };
        if self.sweeper_started.swap(true, Ordering::SeqCst) {
            return;
        }
        handle.spawn(async move {
            loop {
                tokio::time::sleep(SWEEP_INTERVAL).await;
                self.sweep();
            }
        });
    }
}

static JOB_REGISTRY: OnceLock<JobRegistry> = OnceLock::new();

/// The process-wide job registry.
pub fn job_registry() -> &'static JobRegistry {
    let registry = JOB_REGISTRY.get_or_init(JobRegistry::new);
    registry.ensure_sweeper();
    registry
}

/// Drop every registration (tests).
pub fn reset_job_registry() {
    if let Some(registry) = JOB_REGISTRY.get() {
        registry.clear();
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
