// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for engine tests.

use rlx_core::{flow_registry, Flow, SlotDataPoint};
use std::sync::Arc;
use std::time::Duration;

/// Route engine tracing to the test output when `RUST_LOG` is set.
#[allow(dead_code)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Register a flow under a test-unique name and return the shared handle.
/// Tests use distinct names so they never collide on the global registry.
pub(crate) fn register_flow(name: &str, flow: Flow) -> Arc<Flow> {
    let flow = Arc::new(flow);
    flow_registry().register(name, &flow);
    flow
}

/// Poll `cond` every 10 ms until it holds or `timeout` elapses.
pub(crate) async fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Integer `value` field of a delivered data point.
pub(crate) fn value_of(point: &SlotDataPoint) -> i64 {
    point.data.get("value").and_then(|v| v.as_i64()).unwrap_or_default()
}
