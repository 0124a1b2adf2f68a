// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{register_flow, value_of, wait_for};
use rlx_core::{
    payload, reset_execution_hooks, set_execution_hooks, ActivationPolicy, Event, ExecutionHooks,
    LogicError,
};
use serde_json::json;
use serial_test::serial;

const WAIT: Duration = Duration::from_secs(2);

fn store_routine(key: &'static str) -> Routine {
    let mut routine = Routine::new();
    routine.define_slot("in").set_logic(move |ctx| {
        if let Some(point) = ctx.batch("in").first() {
            ctx.job().set_shared(key, point.data.get("value").cloned().unwrap_or(json!(null)));
        }
        Ok(())
    });
    routine
}

#[tokio::test]
async fn exec_unknown_flow_is_a_lookup_error() {
    let runtime = Runtime::with_defaults().unwrap();
    assert_eq!(
        runtime.exec("rt-no-such-flow", None).unwrap_err(),
        RuntimeError::FlowNotFound("rt-no-such-flow".into())
    );
}

#[tokio::test]
async fn exec_returns_a_running_job_immediately() {
    let _flow = register_flow("rt-exec-running", {
        let mut flow = Flow::new("rt-exec-running-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.exec("rt-exec-running", None).unwrap();
    assert_eq!(job.status(), ExecutionStatus::Running);
    assert!(job.context().started_at_ms().is_some());
    assert!(runtime.get_job(job.job_id().as_str()).is_some());
}

#[tokio::test]
async fn exec_rejects_mismatched_job_context() {
    let _flow = register_flow("rt-exec-mismatch", {
        let mut flow = Flow::new("rt-exec-mismatch-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let foreign = Arc::new(JobContext::new("some-other-flow".into()));
    assert!(matches!(
        runtime.exec("rt-exec-mismatch", Some(foreign)),
        Err(RuntimeError::FlowIdMismatch { .. })
    ));
}

#[tokio::test]
async fn post_surfaces_lookup_errors_synchronously() {
    let _flow = register_flow("rt-post-lookup", {
        let mut flow = Flow::new("rt-post-lookup-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    assert!(matches!(
        runtime.post("rt-missing", "store", "in", payload(json!({})), None),
        Err(RuntimeError::FlowNotFound(_))
    ));
    assert!(matches!(
        runtime.post("rt-post-lookup", "ghost", "in", payload(json!({})), None),
        Err(RuntimeError::RoutineNotFound(_))
    ));
    assert!(matches!(
        runtime.post("rt-post-lookup", "store", "ghost", payload(json!({})), None),
        Err(RuntimeError::SlotNotFound { .. })
    ));
    assert!(matches!(
        runtime.post("rt-post-lookup", "store", "in", payload(json!({})), Some("nope")),
        Err(RuntimeError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn linear_pipeline_delivers_transformed_value() {
    let _flow = register_flow("rt-linear", {
        let mut flow = Flow::new("rt-linear-flow");
        let mut doubler = Routine::new();
        doubler.define_slot("in").define_event_with_params("out", ["value"]).set_logic(|ctx| {
            for point in ctx.batch("in") {
                let doubled = value_of(point) * 2;
                ctx.emit("out", payload(json!({ "value": doubled })))?;
            }
            Ok(())
        });
        flow.add_routine("doubler", doubler).unwrap();
        flow.add_routine("sink", store_routine("sink_value")).unwrap();
        flow.connect("doubler", "out", "sink", "in").unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime
        .post("rt-linear", "doubler", "in", payload(json!({ "value": 21 })), None)
        .unwrap();

    assert!(wait_for(WAIT, || job.context().shared("sink_value") == Some(json!(42))).await);
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);

    // Delivery was recorded with its source routine.
    let received = job.context().history_for("sink");
    assert!(received.iter().any(|r| r.kind == RecordKind::SlotDataReceived
        && r.details["emitted_from"] == "doubler"));
}

#[tokio::test]
async fn fan_out_reaches_every_connected_slot() {
    let _flow = register_flow("rt-fanout", {
        let mut flow = Flow::new("rt-fanout-flow");
        let mut source = Routine::new();
        source.define_slot("trigger").define_event("out").set_logic(|ctx| {
            ctx.emit("out", payload(json!({ "x": 1 })))
        });
        flow.add_routine("source", source).unwrap();
        for target in ["t1", "t2"] {
            let mut sink = Routine::new();
            let key = format!("{target}_got");
            sink.define_slot("in").set_logic(move |ctx| {
                let count = ctx.batch("in").len() as i64;
                let prior = ctx.job().shared(&key).and_then(|v| v.as_i64()).unwrap_or(0);
                ctx.job().set_shared(key.clone(), json!(prior + count));
                Ok(())
            });
            flow.add_routine(target, sink).unwrap();
            flow.connect("source", "out", target, "in").unwrap();
        }
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime
        .post("rt-fanout", "source", "trigger", payload(json!({})), None)
        .unwrap();

    assert!(wait_for(WAIT, || {
        job.context().shared("t1_got") == Some(json!(1))
            && job.context().shared("t2_got") == Some(json!(1))
    })
    .await);
}

#[tokio::test]
async fn queue_full_drops_delivery_but_keeps_the_loop_alive() {
    let flow = register_flow("rt-full", {
        let mut flow = Flow::new("rt-full-flow");
        let mut hoarder = Routine::new();
        hoarder
            .define_slot_with("in", 3, 2)
            // Threshold is never reached, so nothing consumes the queue.
            .set_activation_policy(ActivationPolicy::batch_size("in", 10))
            .set_logic(|_ctx| Ok(()));
        flow.add_routine("hoarder", hoarder).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime
        .post("rt-full", "hoarder", "in", payload(json!({ "n": 0 })), None)
        .unwrap();
    for n in 1..5 {
        runtime
            .post("rt-full", "hoarder", "in", payload(json!({ "n": n })), Some(job.job_id().as_str()))
            .unwrap();
    }

    let slot_count = {
        let flow = Arc::clone(&flow);
        move || flow.routine("hoarder").and_then(|r| r.slot("in").map(|s| s.unconsumed_count()))
    };
    assert!(wait_for(WAIT, || slot_count() == Some(3)).await);

    // The event loop survived: the job is not failed and still accepts work.
    assert_ne!(job.status(), ExecutionStatus::Failed);
    runtime
        .post("rt-full", "hoarder", "in", payload(json!({ "n": 9 })), Some(job.job_id().as_str()))
        .unwrap();
}

#[tokio::test]
async fn retry_exhaustion_fails_the_job() {
    let _flow = register_flow("rt-retry", {
        let mut flow = Flow::new("rt-retry-flow");
        let mut flaky = Routine::new();
        flaky.define_slot("in").set_logic(|_ctx| Err(LogicError::new("always broken")));
        flaky.set_error_handler(
            rlx_core::ErrorHandler::retry(2).retry_delay_secs(0.01).retry_backoff(2.0),
        );
        flow.add_routine("flaky", flaky).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-retry", "flaky", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Failed).await);

    // 1 initial + 2 retries = 3 attempts, each recorded.
    let errors: Vec<_> = job
        .context()
        .history_for("flaky")
        .into_iter()
        .filter(|r| r.kind == RecordKind::Error)
        .collect();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors[0].details["will_retry"], json!(true));
    assert_eq!(errors[2].details.get("will_retry"), None);

    // Backoff: gap between attempt k and k+1 is at least delay * 2^(k-1).
    assert!(errors[1].at_ms - errors[0].at_ms >= 10);
    assert!(errors[2].at_ms - errors[1].at_ms >= 20);

    assert_eq!(job.context().routine_state("flaky").map(|s| s.status), Some(RoutineStatus::Failed));
    assert!(job.context().error().unwrap_or_default().contains("always broken"));
}

#[tokio::test]
async fn continue_strategy_records_and_carries_on() {
    let _flow = register_flow("rt-continue", {
        let mut flow = Flow::new("rt-continue-flow");
        let mut wobbly = Routine::new();
        wobbly.define_slot("in").set_logic(|_ctx| Err(LogicError::new("tolerated")));
        wobbly.set_error_handler(rlx_core::ErrorHandler::continue_());
        flow.add_routine("wobbly", wobbly).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-continue", "wobbly", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);

    let history = job.context().history_for("wobbly");
    assert!(history.iter().any(|r| r.kind == RecordKind::ErrorContinued));
    // Completed-with-error: the error is retained on the routine state.
    let state = job.context().routine_state("wobbly").unwrap();
    assert_eq!(state.status, RoutineStatus::Completed);
    assert_eq!(state.error.as_deref(), Some("tolerated"));
}

#[tokio::test]
async fn skip_strategy_drops_the_activation_silently() {
    let _flow = register_flow("rt-skip", {
        let mut flow = Flow::new("rt-skip-flow");
        let mut brittle = Routine::new();
        brittle.define_slot("in").set_logic(|_ctx| Err(LogicError::new("dropped")));
        brittle.set_error_handler(rlx_core::ErrorHandler::skip());
        flow.add_routine("brittle", brittle).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-skip", "brittle", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);
    assert_eq!(job.context().routine_state("brittle").map(|s| s.status), Some(RoutineStatus::Skipped));
}

#[tokio::test]
async fn flow_level_handler_applies_when_routine_has_none() {
    let _flow = register_flow("rt-flow-handler", {
        let mut flow = Flow::new("rt-flow-handler-flow");
        flow.set_error_handler(rlx_core::ErrorHandler::skip());
        let mut brittle = Routine::new();
        brittle.define_slot("in").set_logic(|_ctx| Err(LogicError::new("flow handles this")));
        flow.add_routine("brittle", brittle).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-flow-handler", "brittle", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);
    assert_eq!(job.context().routine_state("brittle").map(|s| s.status), Some(RoutineStatus::Skipped));
}

#[tokio::test]
async fn unhandled_logic_error_stops_the_job() {
    let _flow = register_flow("rt-stop", {
        let mut flow = Flow::new("rt-stop-flow");
        let mut fatal = Routine::new();
        fatal.define_slot("in").set_logic(|_ctx| Err(LogicError::new("fatal")));
        flow.add_routine("fatal", fatal).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-stop", "fatal", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Failed).await);
    assert!(job.context().error().unwrap_or_default().contains("fatal"));
}

#[tokio::test]
async fn panicking_logic_is_contained_to_its_activation() {
    let _flow = register_flow("rt-panic", {
        let mut flow = Flow::new("rt-panic-flow");
        let mut bomb = Routine::new();
        bomb.define_slot("in").set_logic(|_ctx| panic!("boom"));
        bomb.set_error_handler(rlx_core::ErrorHandler::continue_());
        flow.add_routine("bomb", bomb).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-panic", "bomb", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);

    let history = job.context().history_for("bomb");
    assert!(history
        .iter()
        .any(|r| r.kind == RecordKind::ErrorContinued && r.details["error"] == "routine logic panicked"));
}

#[tokio::test]
async fn policy_error_with_default_handler_fails_the_job() {
    let _flow = register_flow("rt-policy-err", {
        let mut flow = Flow::new("rt-policy-err-flow");
        let mut guarded = Routine::new();
        guarded
            .define_slot("in")
            .set_activation_policy(ActivationPolicy::custom(|_, _| {
                Err(rlx_core::PolicyError::new("bad policy"))
            }))
            .set_logic(|_ctx| Ok(()));
        flow.add_routine("guarded", guarded).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-policy-err", "guarded", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Failed).await);
    assert!(job.context().error().unwrap_or_default().contains("bad policy"));
}

#[tokio::test]
async fn policy_error_with_continue_suppresses_the_activation() {
    let _flow = register_flow("rt-policy-cont", {
        let mut flow = Flow::new("rt-policy-cont-flow");
        let mut guarded = Routine::new();
        guarded
            .define_slot("in")
            .set_activation_policy(ActivationPolicy::custom(|_, _| {
                Err(rlx_core::PolicyError::new("flaky policy"))
            }))
            .set_logic(|ctx| {
                ctx.job().set_shared("ran", json!(true));
                Ok(())
            });
        guarded.set_error_handler(rlx_core::ErrorHandler::continue_());
        flow.add_routine("guarded", guarded).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-policy-cont", "guarded", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);
    assert_eq!(job.context().shared("ran"), None);
}

#[tokio::test]
async fn batch_policy_fires_only_at_threshold() {
    let _flow = register_flow("rt-batch", {
        let mut flow = Flow::new("rt-batch-flow");
        let mut batcher = Routine::new();
        batcher
            .define_slot("in")
            .set_activation_policy(ActivationPolicy::batch_size("in", 2))
            .set_logic(|ctx| {
                let sum: i64 = ctx.batch("in").iter().map(value_of).sum();
                ctx.job().set_shared("batch_sum", json!(sum));
                Ok(())
            });
        flow.add_routine("batcher", batcher).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime
        .post("rt-batch", "batcher", "in", payload(json!({ "value": 1 })), None)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(job.context().shared("batch_sum"), None);

    runtime
        .post("rt-batch", "batcher", "in", payload(json!({ "value": 2 })), Some(job.job_id().as_str()))
        .unwrap();
    assert!(wait_for(WAIT, || job.context().shared("batch_sum") == Some(json!(3))).await);
}

#[tokio::test]
async fn job_specific_policy_overrides_routine_default() {
    let _flow = register_flow("rt-override", {
        let mut flow = Flow::new("rt-override-flow");
        // Default is immediate; the job will demand batches of 2 instead.
        let mut counter = Routine::new();
        counter.define_slot("in").set_logic(|ctx| {
            let seen = ctx.batch("in").len() as i64;
            let prior = ctx.job().shared("activations").and_then(|v| v.as_i64()).unwrap_or(0);
            ctx.job().set_shared("activations", json!(prior + 1));
            ctx.job().set_shared("last_batch", json!(seen));
            Ok(())
        });
        flow.add_routine("counter", counter).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.exec("rt-override", None).unwrap();
    job.context()
        .set_activation_policy_override("counter", ActivationPolicy::batch_size("in", 2));

    runtime
        .post("rt-override", "counter", "in", payload(json!({ "value": 1 })), Some(job.job_id().as_str()))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(job.context().shared("activations"), None);

    runtime
        .post("rt-override", "counter", "in", payload(json!({ "value": 2 })), Some(job.job_id().as_str()))
        .unwrap();
    assert!(wait_for(WAIT, || job.context().shared("activations") == Some(json!(1))).await);
    assert_eq!(job.context().shared("last_batch"), Some(json!(2)));
}

#[tokio::test]
async fn routine_without_logic_is_skipped() {
    let _flow = register_flow("rt-no-logic", {
        let mut flow = Flow::new("rt-no-logic-flow");
        let mut husk = Routine::new();
        husk.define_slot("in");
        flow.add_routine("husk", husk).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-no-logic", "husk", "in", payload(json!({})), None).unwrap();
    assert!(wait_for(WAIT, || {
        job.context().routine_state("husk").map(|s| s.status) == Some(RoutineStatus::Skipped)
    })
    .await);
    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn monitoring_counters_track_running_activations() {
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = std::sync::Mutex::new(release_rx);

    let _flow = register_flow("rt-counters", {
        let mut flow = Flow::new("rt-counters-flow");
        let mut slowpoke = Routine::new();
        slowpoke.define_slot("in").set_logic(move |_ctx| {
            let _ = release_rx.lock().map(|rx| rx.recv_timeout(Duration::from_secs(2)));
            Ok(())
        });
        flow.add_routine("slowpoke", slowpoke).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.post("rt-counters", "slowpoke", "in", payload(json!({})), None).unwrap();
    let job_id = job.job_id().as_str().to_string();

    assert!(
        wait_for(WAIT, || runtime.active_thread_count(&job_id, "slowpoke") == 1).await,
        "activation should be visible in the counters while running"
    );
    assert!(runtime.active_routines(&job_id).contains("slowpoke"));

    release_tx.send(()).unwrap();
    assert!(wait_for(WAIT, || runtime.active_thread_count(&job_id, "slowpoke") == 0).await);
    assert!(wait_for(WAIT, || runtime.all_active_thread_counts(&job_id).is_empty()).await);
}

#[tokio::test]
async fn wait_until_all_jobs_finished_observes_idle() {
    let _flow = register_flow("rt-wait", {
        let mut flow = Flow::new("rt-wait-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    runtime.post("rt-wait", "store", "in", payload(json!({ "value": 1 })), None).unwrap();
    assert!(runtime.wait_until_all_jobs_finished(Some(WAIT)).await);
}

#[tokio::test]
async fn paused_jobs_do_not_count_as_active_work() {
    let _flow = register_flow("rt-wait-paused", {
        let mut flow = Flow::new("rt-wait-paused-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.exec("rt-wait-paused", None).unwrap();
    job.pause("hold");
    assert!(runtime.wait_until_all_jobs_finished(Some(Duration::from_millis(200))).await);
}

#[tokio::test]
async fn cancel_job_is_administrative() {
    let _flow = register_flow("rt-cancel-api", {
        let mut flow = Flow::new("rt-cancel-api-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let job = runtime.exec("rt-cancel-api", None).unwrap();
    assert!(runtime.cancel_job(job.job_id().as_str()));
    assert_eq!(job.status(), ExecutionStatus::Cancelled);
    // Second cancel and unknown ids are refused.
    assert!(!runtime.cancel_job(job.job_id().as_str()));
    assert!(!runtime.cancel_job("unknown"));
}

#[tokio::test]
async fn list_jobs_filters_by_status() {
    let _flow = register_flow("rt-list", {
        let mut flow = Flow::new("rt-list-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    let a = runtime.exec("rt-list", None).unwrap();
    let b = runtime.exec("rt-list", None).unwrap();
    b.cancel("done with it");

    assert_eq!(runtime.list_jobs(None).len(), 2);
    let cancelled = runtime.list_jobs(Some(ExecutionStatus::Cancelled));
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].job_id(), b.job_id());
    assert!(runtime
        .list_jobs(Some(ExecutionStatus::Running))
        .iter()
        .all(|j| j.job_id() == a.job_id()));
}

#[tokio::test]
async fn shutdown_rejects_new_work() {
    let _flow = register_flow("rt-shutdown", {
        let mut flow = Flow::new("rt-shutdown-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();

    runtime.shutdown(false, None).await;
    assert!(runtime.is_shut_down());
    assert!(runtime.pool().is_closed());

    assert_eq!(runtime.exec("rt-shutdown", None).unwrap_err(), RuntimeError::RuntimeShutDown);
    assert_eq!(
        runtime.post("rt-shutdown", "store", "in", payload(json!({})), None).unwrap_err(),
        RuntimeError::RuntimeShutDown
    );
}

#[tokio::test]
async fn shutdown_with_wait_returns_within_the_bound() {
    let _flow = register_flow("rt-shutdown-wait", {
        let mut flow = Flow::new("rt-shutdown-wait-flow");
        flow.add_routine("store", store_routine("v")).unwrap();
        flow
    });
    let runtime = Runtime::with_defaults().unwrap();
    let job = runtime.exec("rt-shutdown-wait", None).unwrap();
    job.pause("never quiesce");

    let started = tokio::time::Instant::now();
    runtime.shutdown(true, Some(Duration::from_millis(300))).await;
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!job.executor().is_running());
}

// --- Hook interception (process-wide hooks) ---
//
// The installation point is global, so interceptions are scoped to the
// installing test's flow and the tests run under #[serial]; unrelated
// tests running in parallel pass through untouched.

struct BlockingHooks {
    flow_id: &'static str,
    block_emit: bool,
    block_enqueue: bool,
    withhold_start: bool,
}

impl BlockingHooks {
    fn for_flow(flow_id: &'static str) -> Self {
        Self { flow_id, block_emit: false, block_enqueue: false, withhold_start: false }
    }

    fn applies_to(&self, job: &JobContext) -> bool {
        job.flow_id().as_str() == self.flow_id
    }
}

impl ExecutionHooks for BlockingHooks {
    fn on_routine_start(&self, _routine_id: &str, job: &JobContext) -> bool {
        !(self.withhold_start && self.applies_to(job))
    }

    fn on_event_emit(
        &self,
        _event: &Event,
        _source_routine_id: &str,
        job: &JobContext,
        _data: &Payload,
    ) -> bool {
        !(self.block_emit && self.applies_to(job))
    }

    fn on_slot_before_enqueue(
        &self,
        _slot: &rlx_core::Slot,
        _routine_id: &str,
        job: &JobContext,
        _data: &Payload,
        _flow_id: &rlx_core::FlowId,
    ) -> (bool, Option<String>) {
        if self.block_enqueue && self.applies_to(job) {
            (false, Some("blocked by test".into()))
        } else {
            (true, None)
        }
    }
}

fn emitting_flow(flow_id: &str) -> Flow {
    let mut flow = Flow::new(flow_id);
    let mut source = Routine::new();
    source.define_slot("trigger").define_event("out").set_logic(|ctx| {
        ctx.emit("out", payload(json!({ "value": 1 })))
    });
    flow.add_routine("source", source).unwrap();
    let mut sink = Routine::new();
    sink.define_slot("in").set_logic(|ctx| {
        ctx.job().set_shared("delivered", json!(true));
        Ok(())
    });
    flow.add_routine("sink", sink).unwrap();
    flow.connect("source", "out", "sink", "in").unwrap();
    flow
}

#[tokio::test]
#[serial]
async fn emit_hook_blocks_propagation() {
    let mut hooks = BlockingHooks::for_flow("rt-hook-emit-flow");
    hooks.block_emit = true;
    set_execution_hooks(Arc::new(hooks));

    let _flow = register_flow("rt-hook-emit", emitting_flow("rt-hook-emit-flow"));
    let runtime = Runtime::with_defaults().unwrap();
    let job = runtime.post("rt-hook-emit", "source", "trigger", payload(json!({})), None).unwrap();

    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);
    assert_eq!(job.context().shared("delivered"), None);

    reset_execution_hooks();
}

#[tokio::test]
#[serial]
async fn enqueue_hook_skips_delivery() {
    let mut hooks = BlockingHooks::for_flow("rt-hook-enqueue-flow");
    hooks.block_enqueue = true;
    set_execution_hooks(Arc::new(hooks));

    let _flow = register_flow("rt-hook-enqueue", emitting_flow("rt-hook-enqueue-flow"));
    let runtime = Runtime::with_defaults().unwrap();
    // Everything is arbitrated away, including the external post itself.
    let job = runtime.post("rt-hook-enqueue", "source", "trigger", payload(json!({})), None).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(job.context().shared("delivered"), None);
    let source_slot = job.executor().flow().routine("source").unwrap().slot("trigger").unwrap();
    assert_eq!(source_slot.unconsumed_count(), 0);

    reset_execution_hooks();
}

#[tokio::test]
#[serial]
async fn start_hook_withholds_the_activation() {
    let mut hooks = BlockingHooks::for_flow("rt-hook-start-flow");
    hooks.withhold_start = true;
    set_execution_hooks(Arc::new(hooks));

    let _flow = register_flow("rt-hook-start", emitting_flow("rt-hook-start-flow"));
    let runtime = Runtime::with_defaults().unwrap();
    let job = runtime.post("rt-hook-start", "source", "trigger", payload(json!({})), None).unwrap();

    assert!(wait_for(WAIT, || job.status() == ExecutionStatus::Idle).await);
    // Withheld before logic ran: nothing was emitted.
    assert_eq!(job.context().shared("delivered"), None);
    assert_eq!(
        job.context().routine_state("source").map(|s| s.status),
        Some(RoutineStatus::Idle)
    );

    reset_execution_hooks();
}

#[tokio::test]
#[serial]
async fn panicking_hook_never_reaches_engine_control_flow() {
    struct PanickyHooks;
    impl ExecutionHooks for PanickyHooks {
        fn on_routine_start(&self, _routine_id: &str, job: &JobContext) -> bool {
            if job.flow_id().as_str() == "rt-hook-panic-flow" {
                panic!("hook bug");
            }
            true
        }
    }
    set_execution_hooks(Arc::new(PanickyHooks));

    let _flow = register_flow("rt-hook-panic", emitting_flow("rt-hook-panic-flow"));
    let runtime = Runtime::with_defaults().unwrap();
    let job = runtime.post("rt-hook-panic", "source", "trigger", payload(json!({})), None).unwrap();

    // The panic is swallowed (default: continue) and the pipeline completes.
    assert!(wait_for(WAIT, || job.context().shared("delivered") == Some(json!(true))).await);

    reset_execution_hooks();
}
