// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload type carried by emissions and slot deliveries.

use serde_json::Value;

/// The data dictionary attached to one emission / slot data point.
///
/// Delivered verbatim from emitter to every connected slot; the engine
/// never transforms it at the edge.
pub type Payload = serde_json::Map<String, Value>;

/// Build a [`Payload`] from a `serde_json::json!` object literal.
///
/// Non-object values produce an empty payload; emissions always carry a
/// key→value map.
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
