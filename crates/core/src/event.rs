// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named outbound emission point of a routine.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Outbound emission point. Passive descriptor: emission goes through
/// [`ActivationContext::emit`](crate::ActivationContext::emit), which hands
/// the payload to the engine for routing — an event never mutates slots
/// directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    name: SmolStr,
    /// Advisory schema: the payload keys this event is expected to carry.
    #[serde(default)]
    output_params: Vec<SmolStr>,
}

impl Event {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self { name: SmolStr::new(name.as_ref()), output_params: Vec::new() }
    }

    pub fn with_params<I, S>(name: impl AsRef<str>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name: SmolStr::new(name.as_ref()),
            output_params: params.into_iter().map(|p| SmolStr::new(p.as_ref())).collect(),
        }
    }

    pub fn name(&self) -> &SmolStr {
        &self.name
    }

    pub fn output_params(&self) -> &[SmolStr] {
        &self.output_params
    }
}
