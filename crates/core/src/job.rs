// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job execution state: status, per-routine states, history, shared data.

use crate::id::{FlowId, JobId};
use crate::policy::ActivationPolicy;
use crate::status::{ExecutionStatus, RoutineStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current epoch milliseconds.
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// State of one routine within one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineState {
    pub status: RoutineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RoutineState {
    pub fn idle() -> Self {
        Self { status: RoutineStatus::Idle, error: None }
    }
}

/// Kind of an execution-history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    ActivationCheck,
    Start,
    Completed,
    Error,
    ErrorContinued,
    EventEmit,
    SlotDataReceived,
    StatusChange,
    Paused,
    Resumed,
}

crate::simple_display! {
    RecordKind {
        ActivationCheck => "activation_check",
        Start => "start",
        Completed => "completed",
        Error => "error",
        ErrorContinued => "error_continued",
        EventEmit => "event_emit",
        SlotDataReceived => "slot_data_received",
        StatusChange => "status_change",
        Paused => "paused",
        Resumed => "resumed",
    }
}

/// One append-only entry in a job's execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Routine the record belongs to; `None` for job-level records.
    pub routine_id: Option<SmolStr>,
    pub kind: RecordKind,
    pub details: Value,
    pub at_ms: u64,
}

#[derive(Debug)]
struct JobInner {
    status: ExecutionStatus,
    started_at_ms: Option<u64>,
    completed_at_ms: Option<u64>,
    current_routine_id: Option<SmolStr>,
    routine_states: HashMap<SmolStr, RoutineState>,
    history: Vec<ExecutionRecord>,
    shared_data: serde_json::Map<String, Value>,
    policy_overrides: HashMap<SmolStr, ActivationPolicy>,
    error: Option<String>,
}

/// Mutable state of one running flow instance.
///
/// Shared across the event loop and worker tasks; all interior state sits
/// behind a single mutex (contention is low, per-field locks buy nothing).
/// Status changes are validated against the transition graph — illegal
/// edges, in particular any edge out of a terminal state, are rejected.
#[derive(Debug)]
pub struct JobContext {
    job_id: JobId,
    flow_id: FlowId,
    inner: Mutex<JobInner>,
}

impl JobContext {
    pub fn new(flow_id: FlowId) -> Self {
        Self::with_job_id(JobId::new(), flow_id)
    }

    pub fn with_job_id(job_id: JobId, flow_id: FlowId) -> Self {
        Self {
            job_id,
            flow_id,
            inner: Mutex::new(JobInner {
                status: ExecutionStatus::Pending,
                started_at_ms: None,
                completed_at_ms: None,
                current_routine_id: None,
                routine_states: HashMap::new(),
                history: Vec::new(),
                shared_data: serde_json::Map::new(),
                policy_overrides: HashMap::new(),
                error: None,
            }),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.inner.lock().status
    }

    /// Apply a status transition if it is a legal edge; returns whether the
    /// transition was applied. Successful transitions append a
    /// `status_change` history record.
    pub fn set_status(&self, next: ExecutionStatus) -> bool {
        let mut inner = self.inner.lock();
        let current = inner.status;
        if !current.can_transition_to(next) {
            return false;
        }
        inner.status = next;
        inner.history.push(ExecutionRecord {
            routine_id: None,
            kind: RecordKind::StatusChange,
            details: serde_json::json!({
                "from": current.to_string(),
                "to": next.to_string(),
            }),
            at_ms: epoch_ms(),
        });
        true
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.inner.lock().started_at_ms
    }

    pub fn completed_at_ms(&self) -> Option<u64> {
        self.inner.lock().completed_at_ms
    }

    pub fn mark_started(&self, at_ms: u64) {
        let mut inner = self.inner.lock();
        if inner.started_at_ms.is_none() {
            inner.started_at_ms = Some(at_ms);
        }
    }

    pub fn mark_completed_at(&self, at_ms: u64) {
        self.inner.lock().completed_at_ms = Some(at_ms);
    }

    pub fn error(&self) -> Option<String> {
        self.inner.lock().error.clone()
    }

    pub fn set_error(&self, error: impl Into<String>) {
        let error = error.into();
        let mut inner = self.inner.lock();
        inner.error = Some(error.clone());
        inner.shared_data.insert("error".into(), Value::String(error));
    }

    pub fn current_routine_id(&self) -> Option<SmolStr> {
        self.inner.lock().current_routine_id.clone()
    }

    pub fn set_current_routine_id(&self, routine_id: impl AsRef<str>) {
        self.inner.lock().current_routine_id = Some(SmolStr::new(routine_id.as_ref()));
    }

    pub fn routine_state(&self, routine_id: &str) -> Option<RoutineState> {
        self.inner.lock().routine_states.get(routine_id).cloned()
    }

    pub fn routine_states(&self) -> HashMap<SmolStr, RoutineState> {
        self.inner.lock().routine_states.clone()
    }

    pub fn update_routine_state(
        &self,
        routine_id: impl AsRef<str>,
        status: RoutineStatus,
        error: Option<String>,
    ) {
        self.inner
            .lock()
            .routine_states
            .insert(SmolStr::new(routine_id.as_ref()), RoutineState { status, error });
    }

    /// Move every routine whose status satisfies `from` to `to`.
    pub fn retag_routine_states(
        &self,
        from: impl Fn(RoutineStatus) -> bool,
        to: RoutineStatus,
    ) {
        let mut inner = self.inner.lock();
        for state in inner.routine_states.values_mut() {
            if from(state.status) {
                state.status = to;
            }
        }
    }

    /// Whether every routine state satisfies the predicate. False when no
    /// routine states have been initialized yet.
    pub fn all_routines(&self, pred: impl Fn(RoutineStatus) -> bool) -> bool {
        let inner = self.inner.lock();
        !inner.routine_states.is_empty() && inner.routine_states.values().all(|s| pred(s.status))
    }

    pub fn record_execution(
        &self,
        routine_id: Option<&str>,
        kind: RecordKind,
        details: Value,
    ) {
        self.inner.lock().history.push(ExecutionRecord {
            routine_id: routine_id.map(SmolStr::new),
            kind,
            details,
            at_ms: epoch_ms(),
        });
    }

    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.inner.lock().history.clone()
    }

    /// History entries for one routine, in append order.
    pub fn history_for(&self, routine_id: &str) -> Vec<ExecutionRecord> {
        self.inner
            .lock()
            .history
            .iter()
            .filter(|r| r.routine_id.as_deref() == Some(routine_id))
            .cloned()
            .collect()
    }

    pub fn shared(&self, key: &str) -> Option<Value> {
        self.inner.lock().shared_data.get(key).cloned()
    }

    pub fn set_shared(&self, key: impl Into<String>, value: Value) {
        self.inner.lock().shared_data.insert(key.into(), value);
    }

    pub fn shared_data(&self) -> serde_json::Map<String, Value> {
        self.inner.lock().shared_data.clone()
    }

    /// Job-specific activation policy override for one routine.
    pub fn activation_policy_override(&self, routine_id: &str) -> Option<ActivationPolicy> {
        self.inner.lock().policy_overrides.get(routine_id).cloned()
    }

    pub fn set_activation_policy_override(
        &self,
        routine_id: impl AsRef<str>,
        policy: ActivationPolicy,
    ) {
        self.inner
            .lock()
            .policy_overrides
            .insert(SmolStr::new(routine_id.as_ref()), policy);
    }

    pub fn clear_activation_policy_override(&self, routine_id: &str) {
        self.inner.lock().policy_overrides.remove(routine_id);
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
