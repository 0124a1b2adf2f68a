// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job and routine status enums and the job status transition graph.

use serde::{Deserialize, Serialize};

/// Lifecycle status of one job.
///
/// Transitions follow `PENDING → RUNNING → {IDLE ↔ RUNNING}* → terminal`,
/// with `PAUSED` reachable from (and back to) the live states. Terminal
/// states have no out-edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    /// Quiescent but alive: the job accepts further input.
    Idle,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Whether the job still counts as live work for `wait_until_all_jobs_finished`.
    pub fn is_active(&self) -> bool {
        matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }

    /// Whether `self → next` is a legal edge in the status graph.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        if *self == next {
            return false;
        }
        match self {
            Pending => matches!(next, Running | Cancelled | Failed),
            Running => matches!(next, Idle | Paused | Completed | Failed | Cancelled),
            Idle => matches!(next, Running | Paused | Completed | Failed | Cancelled),
            Paused => matches!(next, Running | Idle | Completed | Failed | Cancelled),
            Completed | Failed | Cancelled => false,
        }
    }
}

crate::simple_display! {
    ExecutionStatus {
        Pending => "pending",
        Running => "running",
        Idle => "idle",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Status of one routine within one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Skipped,
}

crate::simple_display! {
    RoutineStatus {
        Idle => "idle",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// End status of a single routine activation, as reported to
/// `on_routine_end` and the execution history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    Completed,
    /// Logic failed but the CONTINUE strategy kept the job going.
    ErrorContinued,
    Skipped,
    Failed,
}

crate::simple_display! {
    ActivationOutcome {
        Completed => "completed",
        ErrorContinued => "error_continued",
        Skipped => "skipped",
        Failed => "failed",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
