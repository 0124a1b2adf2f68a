// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static workflow graph: routines by id plus the connection set.

use crate::connection::Connection;
use crate::error_handler::ErrorHandler;
use crate::id::FlowId;
use crate::routine::Routine;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;
use std::sync::Arc;
use thiserror::Error;

/// Graph construction failed; surfaced to the caller at build time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("routine '{0}' already exists in flow")]
    DuplicateRoutine(SmolStr),
    #[error("routine '{0}' not found in flow")]
    UnknownRoutine(SmolStr),
    #[error("routine '{routine_id}' has no event '{event}'")]
    UnknownEvent { routine_id: SmolStr, event: SmolStr },
    #[error("routine '{routine_id}' has no slot '{slot}'")]
    UnknownSlot { routine_id: SmolStr, slot: SmolStr },
    #[error("connection already exists: {0}")]
    DuplicateConnection(Connection),
}

/// Static workflow graph shared by every job executing it.
///
/// Holds no runtime state — no queues, no tasks, no running flag. Routines
/// are frozen once added; the connection set may be mutated during
/// execution, with every read and write serialized under the config lock.
pub struct Flow {
    flow_id: FlowId,
    routines: IndexMap<SmolStr, Arc<Routine>>,
    /// The config lock (§: all connection reads snapshot under it).
    connections: RwLock<Vec<Connection>>,
    error_handler: Option<ErrorHandler>,
}

impl Flow {
    pub fn new(flow_id: impl Into<FlowId>) -> Self {
        Self {
            flow_id: flow_id.into(),
            routines: IndexMap::new(),
            connections: RwLock::new(Vec::new()),
            error_handler: None,
        }
    }

    pub fn flow_id(&self) -> &FlowId {
        &self.flow_id
    }

    /// Flow-level default error handler, used when a routine has none.
    pub fn set_error_handler(&mut self, handler: ErrorHandler) {
        self.error_handler = Some(handler);
    }

    pub fn error_handler(&self) -> Option<&ErrorHandler> {
        self.error_handler.as_ref()
    }

    /// Add a routine under a flow-unique id. The routine is frozen from
    /// here on (config bag and error handler stay interior-mutable).
    pub fn add_routine(
        &mut self,
        routine_id: impl AsRef<str>,
        routine: Routine,
    ) -> Result<(), ConfigError> {
        let id = SmolStr::new(routine_id.as_ref());
        if self.routines.contains_key(&id) {
            return Err(ConfigError::DuplicateRoutine(id));
        }
        self.routines.insert(id, Arc::new(routine));
        Ok(())
    }

    pub fn routine(&self, routine_id: &str) -> Option<&Arc<Routine>> {
        self.routines.get(routine_id)
    }

    /// Routines by id, in insertion order.
    pub fn routines(&self) -> &IndexMap<SmolStr, Arc<Routine>> {
        &self.routines
    }

    fn validate_endpoints(&self, connection: &Connection) -> Result<(), ConfigError> {
        let source = self
            .routines
            .get(&connection.source_routine_id)
            .ok_or_else(|| ConfigError::UnknownRoutine(connection.source_routine_id.clone()))?;
        if source.event(&connection.source_event).is_none() {
            return Err(ConfigError::UnknownEvent {
                routine_id: connection.source_routine_id.clone(),
                event: connection.source_event.clone(),
            });
        }
        let target = self
            .routines
            .get(&connection.target_routine_id)
            .ok_or_else(|| ConfigError::UnknownRoutine(connection.target_routine_id.clone()))?;
        if target.slot(&connection.target_slot).is_none() {
            return Err(ConfigError::UnknownSlot {
                routine_id: connection.target_routine_id.clone(),
                slot: connection.target_slot.clone(),
            });
        }
        Ok(())
    }

    /// Wire `(source routine, event) → (target routine, slot)`. Fan-out
    /// from one event and fan-in to one slot are permitted; an identical
    /// duplicate edge is not.
    pub fn connect(
        &self,
        source_routine_id: impl AsRef<str>,
        source_event: impl AsRef<str>,
        target_routine_id: impl AsRef<str>,
        target_slot: impl AsRef<str>,
    ) -> Result<Connection, ConfigError> {
        let connection = Connection::new(
            source_routine_id.as_ref(),
            source_event.as_ref(),
            target_routine_id.as_ref(),
            target_slot.as_ref(),
        );
        self.validate_endpoints(&connection)?;
        let mut connections = self.connections.write();
        if connections.contains(&connection) {
            return Err(ConfigError::DuplicateConnection(connection));
        }
        connections.push(connection.clone());
        Ok(connection)
    }

    /// Remove one edge; returns whether it existed.
    pub fn disconnect(&self, connection: &Connection) -> bool {
        let mut connections = self.connections.write();
        let before = connections.len();
        connections.retain(|c| c != connection);
        connections.len() != before
    }

    /// Drop every edge (live rewiring starts here).
    pub fn clear_connections(&self) {
        self.connections.write().clear();
    }

    /// Atomically replace the whole connection set.
    pub fn set_connections(&self, connections: Vec<Connection>) -> Result<(), ConfigError> {
        for connection in &connections {
            self.validate_endpoints(connection)?;
        }
        *self.connections.write() = connections;
        Ok(())
    }

    /// Snapshot of the connection set.
    pub fn connections(&self) -> Vec<Connection> {
        self.connections.read().clone()
    }

    /// Edges out of one routine's event. Snapshots under the config lock;
    /// the caller iterates lock-free.
    pub fn connections_for_event(&self, routine_id: &str, event: &str) -> Vec<Connection> {
        self.connections
            .read()
            .iter()
            .filter(|c| c.is_from(routine_id, event))
            .cloned()
            .collect()
    }

    /// External serialization form. Runtime-only state is never included.
    pub fn serialize(&self) -> FlowRecord {
        FlowRecord {
            flow_id: self.flow_id.clone(),
            routines: self
                .routines
                .iter()
                .map(|(id, routine)| RoutineRecord {
                    id: id.clone(),
                    config: routine.config(),
                    slots: routine
                        .slots()
                        .values()
                        .map(|s| SlotRecord {
                            name: s.name().clone(),
                            max_queue_length: s.max_queue_length(),
                            watermark: s.watermark(),
                        })
                        .collect(),
                    events: routine.events().values().cloned().collect(),
                })
                .collect(),
            connections: self.connections(),
            error_handler: self.error_handler.clone(),
        }
    }

    /// Rebuild a flow from its serialized form. Logic and activation
    /// policies are not serializable and come back unset; legacy fields in
    /// old records are ignored.
    pub fn deserialize(record: FlowRecord) -> Result<Self, ConfigError> {
        let mut flow = Flow::new(record.flow_id);
        if let Some(handler) = record.error_handler {
            flow.set_error_handler(handler);
        }
        for routine_record in record.routines {
            let mut routine = Routine::new();
            for slot in &routine_record.slots {
                routine.define_slot_with(&slot.name, slot.max_queue_length, slot.watermark);
            }
            for event in &routine_record.events {
                routine.define_event_with_params(event.name(), event.output_params());
            }
            for (key, value) in routine_record.config {
                routine.set_config(key, value);
            }
            flow.add_routine(routine_record.id, routine)?;
        }
        flow.set_connections(record.connections)?;
        Ok(flow)
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("flow_id", &self.flow_id)
            .field("routines", &self.routines.keys().collect::<Vec<_>>())
            .field("connections", &self.connections.read().len())
            .finish()
    }
}

/// Serialized form of one flow. Unknown fields — including the legacy
/// `entry_routine_id`, `entry_params`, `execution_strategy`, and
/// `max_workers` — are ignored on input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    pub flow_id: FlowId,
    #[serde(default)]
    pub routines: Vec<RoutineRecord>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub error_handler: Option<ErrorHandler>,
}

/// Descriptor of one routine: id, serializable config, slot/event surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineRecord {
    pub id: SmolStr,
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,
    #[serde(default)]
    pub slots: Vec<SlotRecord>,
    #[serde(default)]
    pub events: Vec<crate::event::Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRecord {
    pub name: SmolStr,
    #[serde(default = "default_max_queue_length")]
    pub max_queue_length: usize,
    #[serde(default = "default_watermark")]
    pub watermark: usize,
}

fn default_max_queue_length() -> usize {
    crate::slot::DEFAULT_MAX_QUEUE_LENGTH
}

fn default_watermark() -> usize {
    crate::slot::DEFAULT_WATERMARK
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
