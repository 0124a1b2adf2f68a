// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution lifecycle interception seam.
//!
//! The core defines the interface and the process-wide installation point;
//! monitoring/debugging collaborators provide implementations. With nothing
//! installed the engine runs against [`NullExecutionHooks`].

use crate::event::Event;
use crate::id::FlowId;
use crate::job::JobContext;
use crate::payload::Payload;
use crate::slot::Slot;
use crate::status::{ActivationOutcome, ExecutionStatus};
use parking_lot::RwLock;
use std::sync::Arc;

/// Abstract lifecycle interception interface.
///
/// Every method has a no-op default, so implementations override only what
/// they observe. Methods returning `bool` return *true to continue* /
/// *false to intercept*. Implementations must not block: hooks run inline
/// on the routing loop and the worker pool.
pub trait ExecutionHooks: Send + Sync {
    /// Shared worker pool came up.
    fn on_worker_start(&self) {}

    /// Shared worker pool is shutting down.
    fn on_worker_stop(&self) {}

    /// A job's executor started.
    fn on_job_start(&self, _job: &JobContext) {}

    /// A job reached a terminal state.
    fn on_job_end(&self, _job: &JobContext, _status: ExecutionStatus, _error: Option<&str>) {}

    /// A routine activation is about to run. Return `false` to withhold
    /// this activation (breakpoints).
    fn on_routine_start(&self, _routine_id: &str, _job: &JobContext) -> bool {
        true
    }

    /// A routine activation attempt finished with the given outcome.
    fn on_routine_end(
        &self,
        _routine_id: &str,
        _job: &JobContext,
        _outcome: ActivationOutcome,
        _error: Option<&str>,
    ) {
    }

    /// An event was emitted. Return `false` to block propagation to the
    /// connected slots.
    fn on_event_emit(
        &self,
        _event: &Event,
        _source_routine_id: &str,
        _job: &JobContext,
        _data: &Payload,
    ) -> bool {
        true
    }

    /// Data is about to be enqueued into a slot. Return `(false, reason)`
    /// to skip the enqueue; the engine logs the reason and carries on.
    fn on_slot_before_enqueue(
        &self,
        _slot: &Slot,
        _routine_id: &str,
        _job: &JobContext,
        _data: &Payload,
        _flow_id: &FlowId,
    ) -> (bool, Option<String>) {
        (true, None)
    }
}

/// No-op implementation used when no hooks are installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullExecutionHooks;

impl ExecutionHooks for NullExecutionHooks {}

static EXECUTION_HOOKS: RwLock<Option<Arc<dyn ExecutionHooks>>> = RwLock::new(None);

/// The currently installed hooks (null hooks when nothing is installed).
pub fn execution_hooks() -> Arc<dyn ExecutionHooks> {
    match EXECUTION_HOOKS.read().clone() {
        Some(hooks) => hooks,
        None => Arc::new(NullExecutionHooks),
    }
}

/// Install the process-wide hooks implementation. Only one is active at a
/// time; installing replaces the previous one.
pub fn set_execution_hooks(hooks: Arc<dyn ExecutionHooks>) {
    *EXECUTION_HOOKS.write() = Some(hooks);
}

/// Reset to the null implementation (tests, disabling monitoring).
pub fn reset_execution_hooks() {
    *EXECUTION_HOOKS.write() = None;
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
