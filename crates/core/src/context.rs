// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-activation context handed to routine logic.

use crate::event::Event;
use crate::job::JobContext;
use crate::payload::Payload;
use crate::routine::{LogicError, Routine};
use crate::slot::SlotDataPoint;
use serde_json::Value;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Seam between logic and the engine: emissions are handed to the sink,
/// which turns them into routing tasks on the owning job's queue. Routing
/// never mutates slots from inside logic.
pub trait EmitSink: Send + Sync {
    fn route_emission(&self, source_routine_id: &SmolStr, event: &Event, payload: Payload);
}

/// Everything one activation of a routine gets to see: the consumed data
/// batches (slot-name sorted), the policy message, the job state, and the
/// emission sink.
pub struct ActivationContext<'a> {
    routine_id: &'a SmolStr,
    routine: &'a Routine,
    batches: BTreeMap<SmolStr, Vec<SlotDataPoint>>,
    policy_message: Option<Value>,
    job: &'a Arc<JobContext>,
    sink: &'a dyn EmitSink,
}

impl<'a> ActivationContext<'a> {
    pub fn new(
        routine_id: &'a SmolStr,
        routine: &'a Routine,
        batches: BTreeMap<SmolStr, Vec<SlotDataPoint>>,
        policy_message: Option<Value>,
        job: &'a Arc<JobContext>,
        sink: &'a dyn EmitSink,
    ) -> Self {
        Self { routine_id, routine, batches, policy_message, job, sink }
    }

    pub fn routine_id(&self) -> &SmolStr {
        self.routine_id
    }

    /// Consumed batch for one slot (empty when the slice holds nothing for it).
    pub fn batch(&self, slot: &str) -> &[SlotDataPoint] {
        self.batches.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Take ownership of one slot's batch.
    pub fn take(&mut self, slot: &str) -> Vec<SlotDataPoint> {
        self.batches.remove(slot).unwrap_or_default()
    }

    /// All batches, iterated in slot-name sorted order.
    pub fn batches(&self) -> &BTreeMap<SmolStr, Vec<SlotDataPoint>> {
        &self.batches
    }

    /// Opaque auxiliary data returned by the activation policy.
    pub fn policy_message(&self) -> Option<&Value> {
        self.policy_message.as_ref()
    }

    /// The job this activation belongs to. Shared-data updates go through
    /// here; everything else on the job is read-mostly from logic.
    pub fn job(&self) -> &Arc<JobContext> {
        self.job
    }

    /// Emit an event. The payload is handed to the engine and routed to
    /// every connected slot; unknown event names are a logic error.
    pub fn emit(&self, event_name: &str, payload: Payload) -> Result<(), LogicError> {
        let event = self.routine.event(event_name).ok_or_else(|| {
            LogicError::new(format!(
                "routine '{}' has no event '{event_name}'",
                self.routine_id
            ))
        })?;
        self.sink.route_emission(self.routine_id, event, payload);
        Ok(())
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
