// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directed edge from one routine's event to another routine's slot.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Directed edge `(source routine, event) → (target routine, slot)`.
///
/// Purely a record: no transformation happens at the edge, the emission
/// payload is delivered verbatim. Deserialization tolerates legacy fields
/// (notably `param_mapping`) by ignoring them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source_routine_id: SmolStr,
    pub source_event: SmolStr,
    pub target_routine_id: SmolStr,
    pub target_slot: SmolStr,
}

impl Connection {
    pub fn new(
        source_routine_id: impl AsRef<str>,
        source_event: impl AsRef<str>,
        target_routine_id: impl AsRef<str>,
        target_slot: impl AsRef<str>,
    ) -> Self {
        Self {
            source_routine_id: SmolStr::new(source_routine_id.as_ref()),
            source_event: SmolStr::new(source_event.as_ref()),
            target_routine_id: SmolStr::new(target_routine_id.as_ref()),
            target_slot: SmolStr::new(target_slot.as_ref()),
        }
    }

    /// Whether this edge originates at the given routine's event.
    pub fn is_from(&self, routine_id: &str, event: &str) -> bool {
        self.source_routine_id == routine_id && self.source_event == event
    }
}

impl std::fmt::Display for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.source_routine_id, self.source_event, self.target_routine_id, self.target_slot
        )
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
