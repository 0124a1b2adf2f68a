// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide flow lookup by name and flow id.

use crate::flow::Flow;
use crate::id::FlowId;
use parking_lot::Mutex;
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

#[derive(Default)]
struct RegistryInner {
    by_name: HashMap<SmolStr, Weak<Flow>>,
    by_id: HashMap<FlowId, Weak<Flow>>,
}

/// Thread-safe flow-by-name / flow-by-id registry.
///
/// Holds weak references only, so flows stay garbage-collectable once no
/// executor or caller keeps them alive; dead entries are pruned on access.
#[derive(Default)]
pub struct FlowRegistry {
    inner: Mutex<RegistryInner>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow under an external name (and its own flow id).
    pub fn register(&self, name: impl AsRef<str>, flow: &Arc<Flow>) {
        let mut inner = self.inner.lock();
        inner.by_name.insert(SmolStr::new(name.as_ref()), Arc::downgrade(flow));
        inner.by_id.insert(flow.flow_id().clone(), Arc::downgrade(flow));
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Flow>> {
        let mut inner = self.inner.lock();
        match inner.by_name.get(name).and_then(Weak::upgrade) {
            Some(flow) => Some(flow),
            None => {
                inner.by_name.remove(name);
                None
            }
        }
    }

    pub fn get_by_id(&self, flow_id: &str) -> Option<Arc<Flow>> {
        let mut inner = self.inner.lock();
        match inner.by_id.get(flow_id).and_then(Weak::upgrade) {
            Some(flow) => Some(flow),
            None => {
                inner.by_id.remove(flow_id);
                None
            }
        }
    }

    /// Lookup by name, falling back to flow id (callers pass either).
    pub fn resolve(&self, name_or_id: &str) -> Option<Arc<Flow>> {
        self.get_by_name(name_or_id).or_else(|| self.get_by_id(name_or_id))
    }

    /// Remove a name registration; the id entry goes with it when the flow
    /// is still alive.
    pub fn unregister(&self, name: &str) {
        let mut inner = self.inner.lock();
        if let Some(weak) = inner.by_name.remove(name) {
            if let Some(flow) = weak.upgrade() {
                inner.by_id.remove(flow.flow_id().as_str());
            }
        }
    }

    /// Names with live flows.
    pub fn names(&self) -> Vec<SmolStr> {
        let mut inner = self.inner.lock();
        inner.by_name.retain(|_, weak| weak.strong_count() > 0);
        inner.by_name.keys().cloned().collect()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.by_name.clear();
        inner.by_id.clear();
    }
}

static FLOW_REGISTRY: OnceLock<FlowRegistry> = OnceLock::new();

/// The process-wide registry external callers resolve flow names against.
pub fn flow_registry() -> &'static FlowRegistry {
    FLOW_REGISTRY.get_or_init(FlowRegistry::new)
}

/// Drop every registration (tests).
pub fn reset_flow_registry() {
    flow_registry().clear();
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
