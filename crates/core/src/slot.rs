// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded FIFO input queue attached to a routine.

use crate::payload::Payload;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::VecDeque;
use thiserror::Error;

/// Default queue bound when a slot is defined without explicit limits.
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 100;

/// Default pressure threshold (items) when none is given.
pub const DEFAULT_WATERMARK: usize = 80;

/// Enqueue was attempted on a slot whose queue is at capacity.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("slot '{slot}' queue is full ({max_queue_length} items)")]
pub struct SlotQueueFullError {
    pub slot: SmolStr,
    pub max_queue_length: usize,
}

/// One delivered data point waiting in a slot queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotDataPoint {
    pub data: Payload,
    /// Routine id of the emitter, or `"external"` for posted data.
    pub emitted_from: SmolStr,
    /// Epoch milliseconds at emission time.
    pub emitted_at_ms: u64,
}

/// Queue pressure, keyed off the slot's watermark and fullness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    Low,
    Medium,
    High,
    Critical,
}

crate::simple_display! {
    PressureLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

/// Snapshot of a slot's queue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub size: usize,
    pub max_size: usize,
    pub pressure: PressureLevel,
}

/// Bounded FIFO buffer of inbound data for one routine input.
///
/// Thread-safe; the queue never grows past `max_queue_length`. Consumption
/// is slice-oriented: `consume_all_new` drains every unconsumed item in
/// FIFO order.
#[derive(Debug)]
pub struct Slot {
    name: SmolStr,
    max_queue_length: usize,
    watermark: usize,
    queue: Mutex<VecDeque<SlotDataPoint>>,
}

impl Slot {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self::with_bounds(name, DEFAULT_MAX_QUEUE_LENGTH, DEFAULT_WATERMARK)
    }

    pub fn with_bounds(name: impl AsRef<str>, max_queue_length: usize, watermark: usize) -> Self {
        Self {
            name: SmolStr::new(name.as_ref()),
            max_queue_length: max_queue_length.max(1),
            watermark: watermark.min(max_queue_length).max(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn max_queue_length(&self) -> usize {
        self.max_queue_length
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Append a data point, failing when the queue is at capacity.
    pub fn enqueue(
        &self,
        data: Payload,
        emitted_from: impl AsRef<str>,
        emitted_at_ms: u64,
    ) -> Result<(), SlotQueueFullError> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.max_queue_length {
            return Err(SlotQueueFullError {
                slot: self.name.clone(),
                max_queue_length: self.max_queue_length,
            });
        }
        queue.push_back(SlotDataPoint {
            data,
            emitted_from: SmolStr::new(emitted_from.as_ref()),
            emitted_at_ms,
        });
        Ok(())
    }

    /// Drain and return every unconsumed item in FIFO order.
    pub fn consume_all_new(&self) -> Vec<SlotDataPoint> {
        self.queue.lock().drain(..).collect()
    }

    /// Drain and return at most `n` items from the front of the queue.
    pub fn consume_up_to(&self, n: usize) -> Vec<SlotDataPoint> {
        let mut queue = self.queue.lock();
        let take = n.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Number of items currently waiting in the queue.
    pub fn unconsumed_count(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn queue_status(&self) -> QueueStatus {
        let size = self.unconsumed_count();
        QueueStatus {
            size,
            max_size: self.max_queue_length,
            pressure: self.pressure_for(size),
        }
    }

    fn pressure_for(&self, size: usize) -> PressureLevel {
        // High kicks in halfway between the watermark and the hard bound.
        let high = self.watermark + (self.max_queue_length - self.watermark) / 2;
        if size >= self.max_queue_length {
            PressureLevel::Critical
        } else if size >= high {
            PressureLevel::High
        } else if size >= self.watermark {
            PressureLevel::Medium
        } else {
            PressureLevel::Low
        }
    }
}

#[cfg(test)]
#[path = "slot_tests.rs"]
mod tests;
