// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logic unit owning slots, events, a logic function, and policies.

use crate::context::ActivationContext;
use crate::error_handler::ErrorHandler;
use crate::event::Event;
use crate::policy::ActivationPolicy;
use crate::slot::Slot;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;

/// A routine's logic failed. User logic reports failures with this type;
/// panics inside logic are converted to it by the engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct LogicError(pub String);

impl LogicError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for LogicError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for LogicError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// The logic callable invoked per activation.
///
/// Synchronous from the engine's perspective; runs on the shared worker
/// pool. The same routine may be activated concurrently many times within
/// one job, so logic must be safe under that.
pub type LogicFn =
    Arc<dyn Fn(&mut ActivationContext<'_>) -> Result<(), LogicError> + Send + Sync>;

/// Logic unit within a flow: input surface (slots), output surface
/// (events), the logic callable, and the activation predicate.
///
/// Built mutably, then frozen behind `Arc` when added to a
/// [`Flow`](crate::Flow). The config bag and error handler stay
/// interior-mutable afterwards.
pub struct Routine {
    slots: IndexMap<SmolStr, Slot>,
    events: IndexMap<SmolStr, Event>,
    logic: Option<LogicFn>,
    activation_policy: Option<ActivationPolicy>,
    error_handler: Mutex<Option<ErrorHandler>>,
    config: Mutex<serde_json::Map<String, Value>>,
}

impl Default for Routine {
    fn default() -> Self {
        Self::new()
    }
}

impl Routine {
    pub fn new() -> Self {
        Self {
            slots: IndexMap::new(),
            events: IndexMap::new(),
            logic: None,
            activation_policy: None,
            error_handler: Mutex::new(None),
            config: Mutex::new(serde_json::Map::new()),
        }
    }

    /// Define an input slot with default queue bounds. Redefinition
    /// replaces the previous slot of the same name.
    pub fn define_slot(&mut self, name: impl AsRef<str>) -> &mut Self {
        let slot = Slot::new(name.as_ref());
        self.slots.insert(slot.name().clone(), slot);
        self
    }

    /// Define an input slot with an explicit queue bound and watermark.
    pub fn define_slot_with(
        &mut self,
        name: impl AsRef<str>,
        max_queue_length: usize,
        watermark: usize,
    ) -> &mut Self {
        let slot = Slot::with_bounds(name.as_ref(), max_queue_length, watermark);
        self.slots.insert(slot.name().clone(), slot);
        self
    }

    /// Define an output event.
    pub fn define_event(&mut self, name: impl AsRef<str>) -> &mut Self {
        let event = Event::new(name.as_ref());
        self.events.insert(event.name().clone(), event);
        self
    }

    /// Define an output event with an advisory payload-key schema.
    pub fn define_event_with_params<I, S>(&mut self, name: impl AsRef<str>, params: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let event = Event::with_params(name.as_ref(), params);
        self.events.insert(event.name().clone(), event);
        self
    }

    pub fn set_logic(
        &mut self,
        logic: impl Fn(&mut ActivationContext<'_>) -> Result<(), LogicError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.logic = Some(Arc::new(logic));
        self
    }

    pub fn set_activation_policy(&mut self, policy: ActivationPolicy) -> &mut Self {
        self.activation_policy = Some(policy);
        self
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn slots(&self) -> &IndexMap<SmolStr, Slot> {
        &self.slots
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.get(name)
    }

    pub fn events(&self) -> &IndexMap<SmolStr, Event> {
        &self.events
    }

    pub fn logic(&self) -> Option<LogicFn> {
        self.logic.clone()
    }

    pub fn activation_policy(&self) -> Option<&ActivationPolicy> {
        self.activation_policy.as_ref()
    }

    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.lock() = Some(handler);
    }

    pub fn error_handler(&self) -> Option<ErrorHandler> {
        self.error_handler.lock().clone()
    }

    /// Per-instance mutable key→value bag.
    pub fn set_config(&self, key: impl Into<String>, value: Value) {
        self.config.lock().insert(key.into(), value);
    }

    pub fn config_value(&self, key: &str) -> Option<Value> {
        self.config.lock().get(key).cloned()
    }

    pub fn config(&self) -> serde_json::Map<String, Value> {
        self.config.lock().clone()
    }

    /// Total unconsumed items across all slots.
    pub fn pending_count(&self) -> usize {
        self.slots.values().map(Slot::unconsumed_count).sum()
    }
}

impl std::fmt::Debug for Routine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routine")
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("events", &self.events.keys().collect::<Vec<_>>())
            .field("has_logic", &self.logic.is_some())
            .field("activation_policy", &self.activation_policy)
            .finish()
    }
}

#[cfg(test)]
#[path = "routine_tests.rs"]
mod tests;
