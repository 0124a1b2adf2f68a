// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::policy::ActivationPolicy;
use serde_json::json;

fn job() -> JobContext {
    JobContext::new(FlowId::new("flow-1"))
}

#[test]
fn new_job_is_pending() {
    let job = job();
    assert_eq!(job.status(), ExecutionStatus::Pending);
    assert_eq!(job.flow_id(), &FlowId::new("flow-1"));
    assert!(job.started_at_ms().is_none());
    assert!(job.history().is_empty());
}

#[test]
fn job_ids_differ_per_instance() {
    assert_ne!(job().job_id(), job().job_id());
}

#[test]
fn legal_transitions_apply_and_record() {
    let job = job();
    assert!(job.set_status(ExecutionStatus::Running));
    assert!(job.set_status(ExecutionStatus::Idle));
    assert!(job.set_status(ExecutionStatus::Running));
    assert!(job.set_status(ExecutionStatus::Completed));
    assert_eq!(job.status(), ExecutionStatus::Completed);

    let changes: Vec<_> =
        job.history().into_iter().filter(|r| r.kind == RecordKind::StatusChange).collect();
    assert_eq!(changes.len(), 4);
    assert_eq!(changes[0].details["from"], "pending");
    assert_eq!(changes[0].details["to"], "running");
}

#[test]
fn terminal_states_reject_transitions() {
    let job = job();
    job.set_status(ExecutionStatus::Running);
    job.set_status(ExecutionStatus::Failed);

    assert!(!job.set_status(ExecutionStatus::Running));
    assert!(!job.set_status(ExecutionStatus::Completed));
    assert_eq!(job.status(), ExecutionStatus::Failed);
}

#[test]
fn illegal_edge_is_ignored() {
    let job = job();
    assert!(!job.set_status(ExecutionStatus::Idle));
    assert_eq!(job.status(), ExecutionStatus::Pending);
}

#[test]
fn mark_started_is_idempotent() {
    let job = job();
    job.mark_started(100);
    job.mark_started(200);
    assert_eq!(job.started_at_ms(), Some(100));
}

#[test]
fn set_error_mirrors_into_shared_data() {
    let job = job();
    job.set_error("boom");
    assert_eq!(job.error().as_deref(), Some("boom"));
    assert_eq!(job.shared("error"), Some(json!("boom")));
}

#[test]
fn routine_states_update_and_retag() {
    let job = job();
    job.update_routine_state("a", RoutineStatus::Idle, None);
    job.update_routine_state("b", RoutineStatus::Running, None);
    job.update_routine_state("c", RoutineStatus::Failed, Some("err".into()));

    job.retag_routine_states(|s| s == RoutineStatus::Running, RoutineStatus::Idle);
    assert_eq!(job.routine_state("b").unwrap().status, RoutineStatus::Idle);
    assert_eq!(job.routine_state("c").unwrap().status, RoutineStatus::Failed);

    assert!(!job.all_routines(|s| s == RoutineStatus::Idle));
    job.retag_routine_states(|_| true, RoutineStatus::Idle);
    assert!(job.all_routines(|s| s == RoutineStatus::Idle));
}

#[test]
fn all_routines_is_false_when_empty() {
    assert!(!job().all_routines(|_| true));
}

#[test]
fn history_for_filters_by_routine() {
    let job = job();
    job.record_execution(Some("a"), RecordKind::Start, json!({}));
    job.record_execution(Some("b"), RecordKind::Start, json!({}));
    job.record_execution(Some("a"), RecordKind::Completed, json!({"duration_ms": 3}));

    let for_a = job.history_for("a");
    assert_eq!(for_a.len(), 2);
    assert_eq!(for_a[1].kind, RecordKind::Completed);
}

#[test]
fn shared_data_round_trip() {
    let job = job();
    job.set_shared("count", json!(3));
    assert_eq!(job.shared("count"), Some(json!(3)));
    assert!(job.shared("missing").is_none());
    assert_eq!(job.shared_data().len(), 1);
}

#[test]
fn policy_override_set_and_clear() {
    let job = job();
    assert!(job.activation_policy_override("a").is_none());

    job.set_activation_policy_override("a", ActivationPolicy::batch_size("in", 4));
    assert!(job.activation_policy_override("a").is_some());

    job.clear_activation_policy_override("a");
    assert!(job.activation_policy_override("a").is_none());
}
