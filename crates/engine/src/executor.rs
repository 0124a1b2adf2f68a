// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job event loop, task queue, and lifecycle management.

use crate::error::RuntimeError;
use crate::hook;
use crate::runtime::Runtime;
use crate::task::{EventRoutingTask, Task};
use parking_lot::Mutex;
use rlx_core::job::epoch_ms;
use rlx_core::{
    execution_hooks, EmitSink, Event, ExecutionStatus, Flow, JobContext, Payload, RoutineStatus,
};
use serde_json::json;
use smol_str::SmolStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Dequeue timeout: on expiry the loop runs an idle check.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Nap while paused.
const PAUSE_NAP: Duration = Duration::from_millis(10);

struct ExecutorShared {
    rx: Option<mpsc::UnboundedReceiver<Task>>,
    pending_tasks: Vec<Task>,
    loop_task: Option<JoinHandle<()>>,
}

/// Isolated execution context for one job: one task queue, one event-loop
/// task, counters for idle detection, and the lifecycle operations.
///
/// All routing decisions for the job happen on the event-loop task; routine
/// logic runs on the shared [`WorkerPool`](crate::WorkerPool).
pub struct JobExecutor {
    job: Arc<JobContext>,
    flow: Arc<Flow>,
    runtime: Weak<Runtime>,
    tx: mpsc::UnboundedSender<Task>,
    shared: Mutex<ExecutorShared>,
    running: AtomicBool,
    paused: AtomicBool,
    /// Tasks submitted but not yet fully dispatched.
    queued: AtomicUsize,
    /// Routine activations spawned but not yet finished.
    in_flight: AtomicUsize,
    timeout: Option<Duration>,
    started_at: tokio::time::Instant,
}

impl JobExecutor {
    pub(crate) fn new(
        flow: Arc<Flow>,
        job: Arc<JobContext>,
        runtime: Weak<Runtime>,
        timeout: Option<Duration>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            job,
            flow,
            runtime,
            tx,
            shared: Mutex::new(ExecutorShared {
                rx: Some(rx),
                pending_tasks: Vec::new(),
                loop_task: None,
            }),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            timeout,
            started_at: tokio::time::Instant::now(),
        })
    }

    /// Initialize routine states and spawn the event loop. Idempotent:
    /// calling start on a running executor is a no-op.
    pub(crate) fn start(self: &Arc<Self>, handle: &Handle) {
        let rx = {
            let mut shared = self.shared.lock();
            match shared.rx.take() {
                Some(rx) => rx,
                None => return,
            }
        };

        // All routines start IDLE, waiting for external posts.
        for routine_id in self.flow.routines().keys() {
            self.job.update_routine_state(routine_id, RoutineStatus::Idle, None);
        }

        let hooks = execution_hooks();
        hook::call("on_job_start", (), || hooks.on_job_start(&self.job));

        self.running.store(true, Ordering::SeqCst);
        let loop_task = handle.spawn(run_event_loop(Arc::clone(self), rx));
        self.shared.lock().loop_task = Some(loop_task);

        tracing::debug!(job_id = %self.job.job_id(), flow_id = %self.flow.flow_id(), "job started");
    }

    pub fn job(&self) -> &Arc<JobContext> {
        &self.job
    }

    pub fn flow(&self) -> &Arc<Flow> {
        &self.flow
    }

    pub(crate) fn runtime(&self) -> Option<Arc<Runtime>> {
        self.runtime.upgrade()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Tasks waiting in the queue (or mid-dispatch).
    pub fn queued_count(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Activations currently running on the pool.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Submit a task to this job. Paused jobs buffer the task; stopped
    /// jobs reject it.
    pub(crate) fn submit(&self, task: Task) -> Result<(), RuntimeError> {
        if !self.is_running() {
            return Err(RuntimeError::JobStopped(self.job.job_id().to_string()));
        }
        if self.is_paused() {
            self.shared.lock().pending_tasks.push(task);
            return Ok(());
        }
        self.queued.fetch_add(1, Ordering::SeqCst);
        match self.tx.send(task) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.queued.fetch_sub(1, Ordering::SeqCst);
                Err(RuntimeError::JobStopped(self.job.job_id().to_string()))
            }
        }
    }

    /// Pause: new tasks overflow into a pending buffer and the event loop
    /// busy-waits until resumed.
    pub fn pause(&self, reason: &str) -> bool {
        if self.job.status().is_terminal() || self.is_paused() {
            return false;
        }
        self.paused.store(true, Ordering::SeqCst);
        self.job.set_status(ExecutionStatus::Paused);
        self.job.record_execution(
            None,
            rlx_core::RecordKind::Paused,
            json!({ "reason": reason }),
        );
        tracing::debug!(job_id = %self.job.job_id(), reason, "job paused");
        true
    }

    /// Resume: drain the pending buffer back into the live queue.
    pub fn resume(&self) -> bool {
        if !self.is_paused() {
            return false;
        }
        self.job.set_status(ExecutionStatus::Running);
        self.job.record_execution(None, rlx_core::RecordKind::Resumed, json!({}));
        self.paused.store(false, Ordering::SeqCst);

        let pending = std::mem::take(&mut self.shared.lock().pending_tasks);
        for task in pending {
            self.queued.fetch_add(1, Ordering::SeqCst);
            if self.tx.send(task).is_err() {
                self.queued.fetch_sub(1, Ordering::SeqCst);
            }
        }
        tracing::debug!(job_id = %self.job.job_id(), "job resumed");
        true
    }

    /// Cancel: queued tasks are discarded, running activations finish
    /// naturally (their side effects may still land).
    pub fn cancel(&self, reason: &str) -> bool {
        if self.job.status().is_terminal() {
            return false;
        }
        self.paused.store(false, Ordering::SeqCst);
        if !reason.is_empty() {
            self.job.set_error(reason);
        }
        self.job.set_status(ExecutionStatus::Cancelled);
        self.job.mark_completed_at(epoch_ms());
        self.running.store(false, Ordering::SeqCst);

        let hooks = execution_hooks();
        let hook_reason = (!reason.is_empty()).then_some(reason);
        hook::call("on_job_end", (), || {
            hooks.on_job_end(&self.job, ExecutionStatus::Cancelled, hook_reason)
        });
        tracing::info!(job_id = %self.job.job_id(), reason, "job cancelled");
        true
    }

    /// User-initiated graceful completion: stop the event loop, wait for
    /// it, mark COMPLETED (unless already terminal). Further posts to this
    /// job fail.
    pub async fn complete(&self) {
        self.running.store(false, Ordering::SeqCst);
        let loop_task = self.shared.lock().loop_task.take();
        if let Some(task) = loop_task {
            let _ = task.await;
        }

        if self.job.status().is_terminal() {
            return;
        }
        self.job.set_status(ExecutionStatus::Completed);
        self.job.mark_completed_at(epoch_ms());

        let hooks = execution_hooks();
        hook::call("on_job_end", (), || {
            hooks.on_job_end(&self.job, ExecutionStatus::Completed, None)
        });
        crate::registry::job_registry().mark_completed(self.job.job_id());
        tracing::debug!(job_id = %self.job.job_id(), "job completed by user");
    }

    /// Transition the job to FAILED and stop the loop; remaining work is
    /// abandoned.
    pub(crate) fn fail(&self, error: String) {
        if self.job.status().is_terminal() {
            return;
        }
        self.job.set_error(error.clone());
        self.job.set_status(ExecutionStatus::Failed);
        self.job.mark_completed_at(epoch_ms());
        self.running.store(false, Ordering::SeqCst);

        let hooks = execution_hooks();
        hook::call("on_job_end", (), || {
            hooks.on_job_end(&self.job, ExecutionStatus::Failed, Some(error.as_str()))
        });
        tracing::error!(job_id = %self.job.job_id(), error = %error, "job failed");
    }

    /// Stop the loop without touching job status (runtime shutdown).
    pub(crate) fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn timed_out(&self) -> bool {
        match self.timeout {
            Some(timeout) => self.started_at.elapsed() >= timeout,
            None => false,
        }
    }

    fn handle_timeout(&self) {
        let secs = self.timeout.unwrap_or_default().as_secs_f64();
        tracing::warn!(job_id = %self.job.job_id(), "job timed out after {secs}s");
        self.fail(format!("job timed out after {secs}s"));
    }

    /// Called when an activation finishes, and on every dequeue timeout.
    ///
    /// A job is quiescent iff the queue is empty and nothing is in flight.
    /// On quiescence, routines still RUNNING go back to IDLE; if every
    /// routine is settled and the job is RUNNING, the job goes IDLE. The
    /// event loop keeps polling so late posts are still processed.
    pub(crate) fn maybe_go_idle(&self) {
        if self.queued.load(Ordering::SeqCst) != 0 || self.in_flight.load(Ordering::SeqCst) != 0 {
            return;
        }
        self.job
            .retag_routine_states(|s| s == RoutineStatus::Running, RoutineStatus::Idle);
        let settled = self.job.all_routines(|s| {
            matches!(s, RoutineStatus::Idle | RoutineStatus::Completed | RoutineStatus::Skipped)
        });
        if settled
            && self.job.status() == ExecutionStatus::Running
            && self.job.set_status(ExecutionStatus::Idle)
        {
            tracing::debug!(job_id = %self.job.job_id(), "job is now idle");
        }
    }

    pub(crate) fn activation_spawned(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn activation_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.maybe_go_idle();
    }
}

impl std::fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobExecutor")
            .field("job_id", self.job.job_id())
            .field("flow_id", self.flow.flow_id())
            .field("running", &self.is_running())
            .field("paused", &self.is_paused())
            .finish()
    }
}

/// Emission sink handed to routine logic: every emission becomes an
/// [`EventRoutingTask`] on the owning job's queue, keeping routing
/// serialized per job.
pub(crate) struct ExecutorSink {
    pub(crate) executor: Arc<JobExecutor>,
}

impl EmitSink for ExecutorSink {
    fn route_emission(&self, source_routine_id: &SmolStr, event: &Event, payload: Payload) {
        let task = Task::RouteEvent(EventRoutingTask {
            source_routine_id: source_routine_id.clone(),
            event_name: event.name().clone(),
            data: payload,
            emitted_at_ms: epoch_ms(),
        });
        if let Err(e) = self.executor.submit(task) {
            tracing::warn!(
                job_id = %self.executor.job().job_id(),
                routine_id = %source_routine_id,
                event = %event.name(),
                error = %e,
                "emission dropped"
            );
        }
    }
}

/// Event-loop main logic: timed dequeue, dispatch, idle and timeout checks.
async fn run_event_loop(executor: Arc<JobExecutor>, mut rx: mpsc::UnboundedReceiver<Task>) {
    run_event_loop_inner(&executor, &mut rx).await;
    tracing::debug!(job_id = %executor.job.job_id(), "event loop stopped");
}

async fn run_event_loop_inner(
    executor: &Arc<JobExecutor>,
    rx: &mut mpsc::UnboundedReceiver<Task>,
) {
    while executor.is_running() {
        if executor.timed_out() {
            executor.handle_timeout();
            return;
        }
        if executor.is_paused() {
            tokio::time::sleep(PAUSE_NAP).await;
            continue;
        }
        match tokio::time::timeout(POLL_INTERVAL, rx.recv()).await {
            Ok(Some(task)) => {
                dispatch(executor, task);
                executor.queued.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(None) => return,
            Err(_) => executor.maybe_go_idle(),
        }
    }
}

fn dispatch(executor: &Arc<JobExecutor>, task: Task) {
    let job = executor.job();
    if job.status() == ExecutionStatus::Idle {
        job.set_status(ExecutionStatus::Running);
    }
    let Some(runtime) = executor.runtime() else {
        tracing::warn!(job_id = %job.job_id(), "runtime gone, dropping task");
        return;
    };
    match task {
        Task::RouteEvent(task) => runtime.route_event(executor, task),
        Task::Enqueue(task) => runtime.deliver(executor, task),
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
