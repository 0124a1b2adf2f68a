// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced synchronously by `exec` / `post` and administration.
//!
//! Logic and policy failures never appear here: they are recovered locally
//! by the error-handler resolution and observed through job status.

use thiserror::Error;

/// Errors that can occur driving the runtime.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    // Lookup failures
    #[error("flow '{0}' not found in registry")]
    FlowNotFound(String),
    #[error("routine '{0}' not found in flow")]
    RoutineNotFound(String),
    #[error("slot '{slot}' not found in routine '{routine}'")]
    SlotNotFound { routine: String, slot: String },
    #[error("job '{0}' not found")]
    JobNotFound(String),

    // State violations
    #[error("job '{0}' is already completed")]
    JobCompleted(String),
    #[error("job context flow id '{job_flow_id}' does not match flow '{flow_id}'")]
    FlowIdMismatch { job_flow_id: String, flow_id: String },
    #[error("runtime is shut down")]
    RuntimeShutDown,
    #[error("job '{0}' is stopped and no longer accepts tasks")]
    JobStopped(String),

    // Construction failures
    #[error("invalid runtime config: {0}")]
    InvalidConfig(String),
    #[error("runtime must be created inside a tokio runtime context")]
    NoTokioRuntime,
}
