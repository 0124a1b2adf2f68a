// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activation policies: when does a routine fire, and on which data slice.

use crate::job::JobContext;
use crate::slot::{Slot, SlotDataPoint};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// An activation policy raised an error; routed through the routine's
/// error-handler resolution like a logic failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("activation policy failed: {0}")]
pub struct PolicyError(pub String);

impl PolicyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Default)]
pub struct PolicyDecision {
    pub activate: bool,
    /// Data consumed at decision time, keyed by slot name. `None` with
    /// `activate = true` means "consume everything from every slot when
    /// the activation runs".
    pub data_slice: Option<HashMap<SmolStr, Vec<SlotDataPoint>>>,
    /// Opaque auxiliary data handed to the logic as the policy message.
    pub message: Option<serde_json::Value>,
}

impl PolicyDecision {
    /// Do not fire.
    pub fn skip() -> Self {
        Self::default()
    }

    /// Fire, consuming all new data from all slots at activation time.
    pub fn activate_all() -> Self {
        Self { activate: true, data_slice: None, message: None }
    }

    /// Fire on an explicit slice consumed at decision time.
    pub fn activate(data_slice: HashMap<SmolStr, Vec<SlotDataPoint>>) -> Self {
        Self { activate: true, data_slice: Some(data_slice), message: None }
    }

    pub fn with_message(mut self, message: serde_json::Value) -> Self {
        self.message = Some(message);
        self
    }
}

/// Signature of a user-defined policy.
///
/// Policies must not block: they run on the job's routing loop and every
/// evaluation for one routine in one job is serialized behind it.
pub type CustomPolicyFn = Arc<
    dyn Fn(&IndexMap<SmolStr, Slot>, &JobContext) -> Result<PolicyDecision, PolicyError>
        + Send
        + Sync,
>;

/// Pluggable predicate deciding whether a routine fires and with what data.
///
/// Built-ins are tagged variants so they stay introspectable; arbitrary
/// behavior goes through [`ActivationPolicy::Custom`]. Resolution order at
/// activation time: job-specific override → routine default → implicit
/// immediate-consume-all.
#[derive(Clone)]
pub enum ActivationPolicy {
    /// Fire whenever any slot holds new data; consumes it at decision time.
    Immediate,
    /// Fire once a designated slot holds at least `count` items; consumes
    /// exactly one batch per evaluation, leaving any surplus queued.
    BatchSize { slot: SmolStr, count: usize },
    Custom(CustomPolicyFn),
}

impl ActivationPolicy {
    pub fn batch_size(slot: impl AsRef<str>, count: usize) -> Self {
        Self::BatchSize { slot: SmolStr::new(slot.as_ref()), count: count.max(1) }
    }

    pub fn custom(
        f: impl Fn(&IndexMap<SmolStr, Slot>, &JobContext) -> Result<PolicyDecision, PolicyError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Evaluate against the routine's slots. Built-ins consume the data
    /// they select at decision time.
    pub fn evaluate(
        &self,
        slots: &IndexMap<SmolStr, Slot>,
        job: &JobContext,
    ) -> Result<PolicyDecision, PolicyError> {
        match self {
            ActivationPolicy::Immediate => {
                let mut slice: HashMap<SmolStr, Vec<SlotDataPoint>> = HashMap::new();
                for (name, slot) in slots {
                    if slot.unconsumed_count() > 0 {
                        slice.insert(name.clone(), slot.consume_all_new());
                    }
                }
                if slice.is_empty() {
                    Ok(PolicyDecision::skip())
                } else {
                    Ok(PolicyDecision::activate(slice))
                }
            }
            ActivationPolicy::BatchSize { slot, count } => {
                let target = slots
                    .get(slot.as_str())
                    .ok_or_else(|| PolicyError::new(format!("unknown slot '{slot}'")))?;
                if target.unconsumed_count() < *count {
                    return Ok(PolicyDecision::skip());
                }
                let batch = target.consume_up_to(*count);
                let mut slice = HashMap::new();
                slice.insert(slot.clone(), batch);
                Ok(PolicyDecision::activate(slice)
                    .with_message(serde_json::json!({ "batch_size": count })))
            }
            ActivationPolicy::Custom(f) => f(slots, job),
        }
    }
}

impl std::fmt::Debug for ActivationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationPolicy::Immediate => f.write_str("Immediate"),
            ActivationPolicy::BatchSize { slot, count } => {
                f.debug_struct("BatchSize").field("slot", slot).field("count", count).finish()
            }
            ActivationPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod tests;
