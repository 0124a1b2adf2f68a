// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized execution manager: shared worker pool, job registry, event
//! routing, and routine activation.

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::executor::{ExecutorSink, JobExecutor};
use crate::hook;
use crate::pool::WorkerPool;
use crate::registry::job_registry;
use crate::task::{EnqueueTask, EventRoutingTask, Task};
use parking_lot::Mutex;
use rlx_core::job::epoch_ms;
use rlx_core::{
    execution_hooks, ActivationContext, ActivationOutcome, ErrorHandler, ErrorStrategy,
    ExecutionStatus, Flow, JobContext, JobId, LogicError, Payload, PolicyDecision, RecordKind,
    Routine, RoutineStatus, SlotDataPoint,
};
use serde_json::{json, Value};
use smol_str::SmolStr;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// Default cap for `wait_until_all_jobs_finished` so callers never wait
/// forever.
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default bound on the job-drain phase of a waiting shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to one running (or finished) job: the job context plus its
/// executor. Cheap to clone; this pairing replaces back-pointers from the
/// context into the engine.
#[derive(Clone)]
pub struct Job {
    context: Arc<JobContext>,
    executor: Arc<JobExecutor>,
}

impl Job {
    pub fn context(&self) -> &Arc<JobContext> {
        &self.context
    }

    pub fn executor(&self) -> &Arc<JobExecutor> {
        &self.executor
    }

    pub fn job_id(&self) -> &JobId {
        self.context.job_id()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.context.status()
    }

    /// Graceful user-initiated completion; see [`JobExecutor::complete`].
    pub async fn complete(&self) {
        self.executor.complete().await;
    }

    pub fn cancel(&self, reason: &str) -> bool {
        self.executor.cancel(reason)
    }

    pub fn pause(&self, reason: &str) -> bool {
        self.executor.pause(reason)
    }

    pub fn resume(&self) -> bool {
        self.executor.resume()
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("job_id", self.context.job_id())
            .field("status", &self.context.status())
            .finish()
    }
}

/// The engine object: owns the shared worker pool and the active-job
/// registry, drives routine activation, and routes events between
/// routines. Jobs from many flows execute concurrently on one runtime.
pub struct Runtime {
    config: RuntimeConfig,
    pool: WorkerPool,
    handle: Handle,
    active_jobs: Mutex<HashMap<JobId, Job>>,
    /// Monitoring counters; each under its own lock, never held across
    /// external calls.
    active_routines: Mutex<HashMap<JobId, HashSet<SmolStr>>>,
    thread_counts: Mutex<HashMap<JobId, HashMap<SmolStr, usize>>>,
    shut_down: AtomicBool,
}

impl Runtime {
    /// Build a runtime on the current tokio context.
    pub fn new(config: RuntimeConfig) -> Result<Arc<Self>, RuntimeError> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoTokioRuntime)?;
        let pool = WorkerPool::new(config.thread_pool_size);

        let hooks = execution_hooks();
        hook::call("on_worker_start", (), || hooks.on_worker_start());

        Ok(Arc::new(Self {
            config,
            pool,
            handle,
            active_jobs: Mutex::new(HashMap::new()),
            active_routines: Mutex::new(HashMap::new()),
            thread_counts: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }))
    }

    pub fn with_defaults() -> Result<Arc<Self>, RuntimeError> {
        Self::new(RuntimeConfig::default())
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn ensure_live(&self) -> Result<(), RuntimeError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(RuntimeError::RuntimeShutDown);
        }
        Ok(())
    }

    /// Start executing a flow; returns immediately with the job RUNNING.
    ///
    /// `existing` resumes a previously created context (its `flow_id` must
    /// match the flow). All routines start IDLE; data arrives via
    /// [`Runtime::post`].
    pub fn exec(
        self: &Arc<Self>,
        flow_name: &str,
        existing: Option<Arc<JobContext>>,
    ) -> Result<Job, RuntimeError> {
        self.ensure_live()?;
        let flow = rlx_core::flow_registry()
            .resolve(flow_name)
            .ok_or_else(|| RuntimeError::FlowNotFound(flow_name.to_string()))?;

        let context = match existing {
            Some(context) => {
                if context.flow_id() != flow.flow_id() {
                    return Err(RuntimeError::FlowIdMismatch {
                        job_flow_id: context.flow_id().to_string(),
                        flow_id: flow.flow_id().to_string(),
                    });
                }
                // Resuming a job whose executor is still live hands back
                // the existing handle instead of double-executing.
                if let Some(job) = self.get_job(context.job_id().as_str()) {
                    if job.executor.is_running() {
                        return Ok(job);
                    }
                }
                context
            }
            None => Arc::new(JobContext::new(flow.flow_id().clone())),
        };

        context.set_status(ExecutionStatus::Running);
        context.mark_started(epoch_ms());

        let executor = JobExecutor::new(
            Arc::clone(&flow),
            Arc::clone(&context),
            Arc::downgrade(self),
            self.config.execution_timeout,
        );
        executor.start(&self.handle);

        let job = Job { context: Arc::clone(&context), executor: Arc::clone(&executor) };
        self.active_jobs.lock().insert(context.job_id().clone(), job.clone());
        job_registry().register(&context, &executor);

        Ok(job)
    }

    /// Inject data into a routine's slot — the only way in from outside.
    ///
    /// Without `job_id` a fresh job is created; with it, the job is looked
    /// up and must not be COMPLETED. Lookup failures and state violations
    /// surface synchronously; delivery itself is asynchronous.
    pub fn post(
        self: &Arc<Self>,
        flow_name: &str,
        routine_name: &str,
        slot_name: &str,
        data: Payload,
        job_id: Option<&str>,
    ) -> Result<Job, RuntimeError> {
        self.ensure_live()?;
        let flow = rlx_core::flow_registry()
            .resolve(flow_name)
            .ok_or_else(|| RuntimeError::FlowNotFound(flow_name.to_string()))?;

        let routine = flow
            .routine(routine_name)
            .ok_or_else(|| RuntimeError::RoutineNotFound(routine_name.to_string()))?;
        if routine.slot(slot_name).is_none() {
            return Err(RuntimeError::SlotNotFound {
                routine: routine_name.to_string(),
                slot: slot_name.to_string(),
            });
        }

        let job = match job_id {
            Some(id) => {
                let job = match self.get_job(id) {
                    Some(job) => Some(job),
                    // Jobs started by another runtime are reachable
                    // through the process-wide registry.
                    None => job_registry()
                        .entry(id)
                        .map(|(context, executor)| Job { context, executor }),
                };
                let job = job.ok_or_else(|| RuntimeError::JobNotFound(id.to_string()))?;
                if job.status() == ExecutionStatus::Completed {
                    return Err(RuntimeError::JobCompleted(id.to_string()));
                }
                job
            }
            None => self.exec(flow_name, None)?,
        };

        job.executor.submit(Task::Enqueue(EnqueueTask {
            target_routine_id: SmolStr::new(routine_name),
            target_slot: SmolStr::new(slot_name),
            data,
            emitted_from: SmolStr::new("external"),
            emitted_at_ms: epoch_ms(),
        }))?;

        Ok(job)
    }

    /// Route one emission to every connected slot. Runs on the owning
    /// job's event-loop task.
    pub(crate) fn route_event(
        self: &Arc<Self>,
        executor: &Arc<JobExecutor>,
        task: EventRoutingTask,
    ) {
        let flow = executor.flow();
        let job = executor.job();

        let Some(event) = flow
            .routine(&task.source_routine_id)
            .and_then(|r| r.event(&task.event_name))
        else {
            tracing::warn!(
                job_id = %job.job_id(),
                routine_id = %task.source_routine_id,
                event = %task.event_name,
                "cannot route emission from unknown event"
            );
            return;
        };

        job.record_execution(
            Some(task.source_routine_id.as_str()),
            RecordKind::EventEmit,
            json!({ "event_name": task.event_name.as_str(), "data": Value::Object(task.data.clone()) }),
        );

        let hooks = execution_hooks();
        let proceed = hook::call("on_event_emit", true, || {
            hooks.on_event_emit(event, &task.source_routine_id, job, &task.data)
        });
        if !proceed {
            tracing::debug!(
                job_id = %job.job_id(),
                event = %task.event_name,
                "emission intercepted by hook"
            );
            return;
        }

        let connections = flow.connections_for_event(&task.source_routine_id, &task.event_name);
        if connections.is_empty() {
            // No consumers: discard silently, the normal case for leaf events.
            return;
        }

        // One enqueue attempt per connection; a full sibling slot never
        // blocks the others.
        for connection in connections {
            let enqueue = Task::Enqueue(EnqueueTask {
                target_routine_id: connection.target_routine_id.clone(),
                target_slot: connection.target_slot.clone(),
                data: task.data.clone(),
                emitted_from: task.source_routine_id.clone(),
                emitted_at_ms: task.emitted_at_ms,
            });
            if let Err(e) = executor.submit(enqueue) {
                tracing::warn!(
                    job_id = %job.job_id(),
                    connection = %connection,
                    error = %e,
                    "failed to enqueue routed emission"
                );
            }
        }
    }

    /// Deliver one payload into a slot (hook arbitration, bounded enqueue)
    /// and drive the owning routine's activation check. Runs on the
    /// event-loop task.
    pub(crate) fn deliver(self: &Arc<Self>, executor: &Arc<JobExecutor>, task: EnqueueTask) {
        let flow = executor.flow();
        let job = executor.job();

        let Some(routine) = flow.routine(&task.target_routine_id) else {
            tracing::warn!(
                job_id = %job.job_id(),
                routine_id = %task.target_routine_id,
                "dropping delivery to unknown routine"
            );
            return;
        };
        let Some(slot) = routine.slot(&task.target_slot) else {
            tracing::warn!(
                job_id = %job.job_id(),
                routine_id = %task.target_routine_id,
                slot = %task.target_slot,
                "dropping delivery to unknown slot"
            );
            return;
        };

        let hooks = execution_hooks();
        let (proceed, reason) = hook::call("on_slot_before_enqueue", (true, None), || {
            hooks.on_slot_before_enqueue(
                slot,
                &task.target_routine_id,
                job,
                &task.data,
                flow.flow_id(),
            )
        });
        if !proceed {
            tracing::info!(
                job_id = %job.job_id(),
                routine_id = %task.target_routine_id,
                slot = %task.target_slot,
                reason = reason.as_deref().unwrap_or("unspecified"),
                "enqueue skipped by hook"
            );
            return;
        }

        if let Err(e) = slot.enqueue(task.data, &task.emitted_from, task.emitted_at_ms) {
            // One full slot must not stall the flow: log and carry on.
            tracing::warn!(
                job_id = %job.job_id(),
                routine_id = %task.target_routine_id,
                slot = %task.target_slot,
                error = %e,
                "slot queue full, ignoring delivery"
            );
            return;
        }

        job.record_execution(
            Some(task.target_routine_id.as_str()),
            RecordKind::SlotDataReceived,
            json!({
                "slot_name": task.target_slot.as_str(),
                "emitted_from": task.emitted_from.as_str(),
            }),
        );

        self.check_routine_activation(executor, &task.target_routine_id, routine);
    }

    /// Run the activation policy for a routine and, if it fires, hand the
    /// logic to the worker pool. Evaluations for one routine in one job
    /// are serialized: this only ever runs on the job's event-loop task.
    fn check_routine_activation(
        self: &Arc<Self>,
        executor: &Arc<JobExecutor>,
        routine_id: &SmolStr,
        routine: &Arc<Routine>,
    ) {
        let job = executor.job();
        job.record_execution(
            Some(routine_id.as_str()),
            RecordKind::ActivationCheck,
            json!({
                "slot_data_counts": routine
                    .slots()
                    .iter()
                    .map(|(name, slot)| (name.to_string(), slot.unconsumed_count()))
                    .collect::<HashMap<_, _>>(),
            }),
        );

        // Job-specific override → routine default → immediate-consume-all.
        let policy = job
            .activation_policy_override(routine_id)
            .or_else(|| routine.activation_policy().cloned());

        let decision = match policy {
            Some(policy) => match policy.evaluate(routine.slots(), job) {
                Ok(decision) => decision,
                Err(e) => {
                    self.handle_policy_error(executor, routine_id, routine, e);
                    return;
                }
            },
            None => PolicyDecision::activate_all(),
        };

        if !decision.activate {
            return;
        }

        // Materialize the batches now, still on the routing task: the
        // policy's slice, or everything currently queued.
        let batches: BTreeMap<SmolStr, Vec<SlotDataPoint>> = match decision.data_slice {
            Some(slice) => slice.into_iter().collect(),
            None => routine
                .slots()
                .iter()
                .map(|(name, slot)| (name.clone(), slot.consume_all_new()))
                .collect(),
        };

        job.set_current_routine_id(routine_id);
        job.update_routine_state(routine_id, RoutineStatus::Running, None);
        job.record_execution(
            Some(routine_id.as_str()),
            RecordKind::Start,
            json!({
                "slot_data_counts": batches
                    .iter()
                    .map(|(name, batch)| (name.to_string(), batch.len()))
                    .collect::<HashMap<_, _>>(),
                "policy_message": decision.message.clone().unwrap_or(Value::Null),
            }),
        );

        let hooks = execution_hooks();
        let proceed =
            hook::call("on_routine_start", true, || hooks.on_routine_start(routine_id, job));
        if !proceed {
            // Withheld by a breakpoint: the activation never runs and the
            // consumed slice is dropped with it.
            tracing::debug!(
                job_id = %job.job_id(),
                routine_id = %routine_id,
                "activation withheld by hook"
            );
            job.update_routine_state(routine_id, RoutineStatus::Idle, None);
            return;
        }

        executor.activation_spawned();
        self.handle.spawn(run_activation(
            Arc::clone(self),
            Arc::clone(executor),
            routine_id.clone(),
            Arc::clone(routine),
            batches,
            decision.message,
        ));
    }

    fn handle_policy_error(
        self: &Arc<Self>,
        executor: &Arc<JobExecutor>,
        routine_id: &SmolStr,
        routine: &Arc<Routine>,
        error: rlx_core::PolicyError,
    ) {
        let job = executor.job();
        tracing::error!(
            job_id = %job.job_id(),
            routine_id = %routine_id,
            error = %error,
            "activation policy failed"
        );
        job.record_execution(
            Some(routine_id.as_str()),
            RecordKind::Error,
            json!({ "error": error.to_string(), "source": "activation_policy" }),
        );

        let handler = self.resolve_error_handler(executor.flow(), routine);
        match handler.strategy {
            ErrorStrategy::Stop => {
                job.update_routine_state(routine_id, RoutineStatus::Failed, Some(error.to_string()));
                executor.fail(format!("activation policy error: {error}"));
            }
            // Everything else suppresses the activation and moves on.
            _ => {
                tracing::warn!(
                    job_id = %job.job_id(),
                    routine_id = %routine_id,
                    strategy = %handler.strategy,
                    "activation suppressed after policy error"
                );
            }
        }
    }

    /// Routine handler → flow handler → default STOP.
    fn resolve_error_handler(&self, flow: &Arc<Flow>, routine: &Arc<Routine>) -> ErrorHandler {
        routine
            .error_handler()
            .or_else(|| flow.error_handler().cloned())
            .unwrap_or_default()
    }

    fn note_activation_started(&self, job_id: &JobId, routine_id: &SmolStr) {
        self.active_routines
            .lock()
            .entry(job_id.clone())
            .or_default()
            .insert(routine_id.clone());
        *self
            .thread_counts
            .lock()
            .entry(job_id.clone())
            .or_default()
            .entry(routine_id.clone())
            .or_insert(0) += 1;
    }

    fn note_activation_finished(&self, job_id: &JobId, routine_id: &SmolStr) {
        let mut active = self.active_routines.lock();
        if let Some(set) = active.get_mut(job_id) {
            set.remove(routine_id);
            if set.is_empty() {
                active.remove(job_id);
            }
        }
        drop(active);

        let mut counts = self.thread_counts.lock();
        if let Some(per_routine) = counts.get_mut(job_id) {
            if let Some(count) = per_routine.get_mut(routine_id) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    per_routine.remove(routine_id);
                }
            }
            if per_routine.is_empty() {
                counts.remove(job_id);
            }
        }
    }

    /// Routine ids currently executing for a job (monitoring).
    pub fn active_routines(&self, job_id: &str) -> HashSet<SmolStr> {
        self.active_routines.lock().get(job_id).cloned().unwrap_or_default()
    }

    /// Concurrent activations of one routine in one job (monitoring).
    pub fn active_thread_count(&self, job_id: &str, routine_id: &str) -> usize {
        self.thread_counts
            .lock()
            .get(job_id)
            .and_then(|per_routine| per_routine.get(routine_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn all_active_thread_counts(&self, job_id: &str) -> HashMap<SmolStr, usize> {
        self.thread_counts.lock().get(job_id).cloned().unwrap_or_default()
    }

    pub fn get_job(&self, job_id: &str) -> Option<Job> {
        self.active_jobs.lock().get(job_id).cloned()
    }

    pub fn list_jobs(&self, status: Option<ExecutionStatus>) -> Vec<Job> {
        let jobs = self.active_jobs.lock();
        jobs.values()
            .filter(|job| status.map_or(true, |s| job.status() == s))
            .cloned()
            .collect()
    }

    /// Cancel a job; returns false for unknown or already-terminal jobs.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        match self.get_job(job_id) {
            Some(job) if !job.status().is_terminal() => job.cancel("cancelled by runtime"),
            _ => false,
        }
    }

    /// Poll until no job is RUNNING or PENDING; false on timeout
    /// (default cap one hour).
    pub async fn wait_until_all_jobs_finished(&self, timeout: Option<Duration>) -> bool {
        let deadline = tokio::time::Instant::now() + timeout.unwrap_or(DEFAULT_WAIT_TIMEOUT);
        loop {
            let active =
                self.active_jobs.lock().values().filter(|j| j.status().is_active()).count();
            if active == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Shut the runtime down. With `wait`, jobs get up to `timeout`
    /// (default 5 s) to drain before every executor is halted and the pool
    /// closed; without, the cascade is immediate.
    pub async fn shutdown(&self, wait: bool, timeout: Option<Duration>) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if wait {
            self.wait_until_all_jobs_finished(Some(timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)))
                .await;
        }
        for job in self.active_jobs.lock().values() {
            job.executor.halt();
        }
        self.pool.close();

        let hooks = execution_hooks();
        hook::call("on_worker_stop", (), || hooks.on_worker_stop());
        tracing::debug!("runtime shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("thread_pool_size", &self.config.thread_pool_size)
            .field("active_jobs", &self.active_jobs.lock().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// One routine activation on the worker pool: run the logic (all retry
/// attempts included) under a single pool permit, then report back for
/// idle detection.
async fn run_activation(
    runtime: Arc<Runtime>,
    executor: Arc<JobExecutor>,
    routine_id: SmolStr,
    routine: Arc<Routine>,
    batches: BTreeMap<SmolStr, Vec<SlotDataPoint>>,
    policy_message: Option<Value>,
) {
    let permit = match runtime.pool.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            // Pool closed while queued: the activation is discarded.
            executor.activation_finished();
            return;
        }
    };

    let job = Arc::clone(executor.job());
    let hooks = execution_hooks();

    let Some(logic) = routine.logic() else {
        tracing::warn!(
            job_id = %job.job_id(),
            routine_id = %routine_id,
            "routine has no logic set, skipping activation"
        );
        job.update_routine_state(&routine_id, RoutineStatus::Skipped, None);
        hook::call("on_routine_end", (), || {
            hooks.on_routine_end(&routine_id, &job, ActivationOutcome::Skipped, None)
        });
        drop(permit);
        executor.activation_finished();
        return;
    };

    runtime.note_activation_started(job.job_id(), &routine_id);

    let handler = runtime.resolve_error_handler(executor.flow(), &routine);
    let max_attempts = match handler.strategy {
        ErrorStrategy::Retry => 1 + handler.max_retries,
        _ => 1,
    };
    let sink = ExecutorSink { executor: Arc::clone(&executor) };
    let mut attempt: u32 = 1;

    loop {
        let started = tokio::time::Instant::now();
        let result = {
            let mut ctx = ActivationContext::new(
                &routine_id,
                &routine,
                batches.clone(),
                policy_message.clone(),
                &job,
                &sink,
            );
            // A panicking worker terminates only its activation.
            catch_unwind(AssertUnwindSafe(|| (*logic)(&mut ctx)))
                .unwrap_or_else(|_| Err(LogicError::new("routine logic panicked")))
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                job.update_routine_state(&routine_id, RoutineStatus::Completed, None);
                job.record_execution(
                    Some(routine_id.as_str()),
                    RecordKind::Completed,
                    json!({ "duration_ms": duration_ms, "attempt": attempt }),
                );
                hook::call("on_routine_end", (), || {
                    hooks.on_routine_end(&routine_id, &job, ActivationOutcome::Completed, None)
                });
                break;
            }
            Err(error) => {
                tracing::error!(
                    job_id = %job.job_id(),
                    routine_id = %routine_id,
                    attempt,
                    error = %error,
                    "routine logic failed"
                );
                let message = error.0;
                match handler.strategy {
                    ErrorStrategy::Continue => {
                        job.record_execution(
                            Some(routine_id.as_str()),
                            RecordKind::ErrorContinued,
                            json!({ "error": message.clone(), "duration_ms": duration_ms }),
                        );
                        job.update_routine_state(
                            &routine_id,
                            RoutineStatus::Completed,
                            Some(message.clone()),
                        );
                        hook::call("on_routine_end", (), || {
                            hooks.on_routine_end(
                                &routine_id,
                                &job,
                                ActivationOutcome::ErrorContinued,
                                Some(message.as_str()),
                            )
                        });
                        break;
                    }
                    ErrorStrategy::Skip => {
                        job.record_execution(
                            Some(routine_id.as_str()),
                            RecordKind::Error,
                            json!({ "error": message.clone(), "duration_ms": duration_ms }),
                        );
                        job.update_routine_state(
                            &routine_id,
                            RoutineStatus::Skipped,
                            Some(message.clone()),
                        );
                        hook::call("on_routine_end", (), || {
                            hooks.on_routine_end(
                                &routine_id,
                                &job,
                                ActivationOutcome::Skipped,
                                Some(message.as_str()),
                            )
                        });
                        break;
                    }
                    ErrorStrategy::Retry if attempt < max_attempts => {
                        job.record_execution(
                            Some(routine_id.as_str()),
                            RecordKind::Error,
                            json!({
                                "error": message.clone(),
                                "duration_ms": duration_ms,
                                "attempt": attempt,
                                "will_retry": true,
                            }),
                        );
                        hook::call("on_routine_end", (), || {
                            hooks.on_routine_end(
                                &routine_id,
                                &job,
                                ActivationOutcome::Failed,
                                Some(message.as_str()),
                            )
                        });
                        tokio::time::sleep(handler.delay_for_attempt(attempt)).await;
                        attempt += 1;
                    }
                    // STOP, or RETRY out of attempts: fail the job.
                    ErrorStrategy::Stop | ErrorStrategy::Retry => {
                        job.record_execution(
                            Some(routine_id.as_str()),
                            RecordKind::Error,
                            json!({
                                "error": message.clone(),
                                "duration_ms": duration_ms,
                                "attempt": attempt,
                            }),
                        );
                        job.update_routine_state(
                            &routine_id,
                            RoutineStatus::Failed,
                            Some(message.clone()),
                        );
                        hook::call("on_routine_end", (), || {
                            hooks.on_routine_end(
                                &routine_id,
                                &job,
                                ActivationOutcome::Failed,
                                Some(message.as_str()),
                            )
                        });
                        executor.fail(format!("logic error: {message}"));
                        break;
                    }
                }
            }
        }
    }

    runtime.note_activation_finished(job.job_id(), &routine_id);
    drop(permit);
    executor.activation_finished();
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
