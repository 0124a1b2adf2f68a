// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tasks processed by a job's event loop.

use rlx_core::Payload;
use smol_str::SmolStr;

/// Deliver one payload into a slot, then drive the owning routine's
/// activation check.
#[derive(Debug, Clone)]
pub struct EnqueueTask {
    pub target_routine_id: SmolStr,
    pub target_slot: SmolStr,
    pub data: Payload,
    /// Source routine id, or `"external"` for `Runtime::post` deliveries.
    pub emitted_from: SmolStr,
    pub emitted_at_ms: u64,
}

/// Resolve the connections of one emission and fan it out as one
/// [`EnqueueTask`] per target slot. Always handled on the job's event-loop
/// task, so all routing decisions within a job are totally ordered.
#[derive(Debug, Clone)]
pub struct EventRoutingTask {
    pub source_routine_id: SmolStr,
    pub event_name: SmolStr,
    pub data: Payload,
    pub emitted_at_ms: u64,
}

/// One unit of work on a job's task queue.
#[derive(Debug, Clone)]
pub enum Task {
    Enqueue(EnqueueTask),
    RouteEvent(EventRoutingTask),
}
