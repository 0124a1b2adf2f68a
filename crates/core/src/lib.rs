// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rlx-core: data model for the Routilux dataflow engine.
//!
//! Flows, routines, slots, events, connections, error-handling policies,
//! activation policies, per-job context, and the execution hooks seam.
//! Everything here is runtime-free; scheduling lives in `rlx-engine`.

pub mod macros;

pub mod connection;
pub mod context;
pub mod error_handler;
pub mod event;
pub mod flow;
pub mod hooks;
pub mod id;
pub mod job;
pub mod payload;
pub mod policy;
pub mod registry;
pub mod routine;
pub mod slot;
pub mod status;

pub use connection::Connection;
pub use context::{ActivationContext, EmitSink};
pub use error_handler::{ErrorHandler, ErrorStrategy};
pub use event::Event;
pub use flow::{ConfigError, Flow, FlowRecord};
pub use hooks::{
    execution_hooks, reset_execution_hooks, set_execution_hooks, ExecutionHooks,
    NullExecutionHooks,
};
pub use id::{FlowId, JobId};
pub use job::{ExecutionRecord, JobContext, RecordKind, RoutineState};
pub use payload::{payload, Payload};
pub use policy::{ActivationPolicy, PolicyDecision, PolicyError};
pub use registry::{flow_registry, reset_flow_registry, FlowRegistry};
pub use routine::{LogicError, LogicFn, Routine};
pub use slot::{PressureLevel, QueueStatus, Slot, SlotDataPoint, SlotQueueFullError};
pub use status::{ActivationOutcome, ExecutionStatus, RoutineStatus};
