// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration, from the caller or the environment.

use crate::error::RuntimeError;
use std::time::Duration;

/// Default worker pool size shared by all jobs.
pub const DEFAULT_THREAD_POOL_SIZE: usize = 10;

/// Pool sizes beyond this are accepted but flagged in the log.
const POOL_SIZE_WARN_THRESHOLD: usize = 1000;

/// Configuration for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Size of the shared worker pool. Must be at least 1.
    pub thread_pool_size: usize,
    /// Default per-job timeout; `None` leaves jobs unbounded.
    pub execution_timeout: Option<Duration>,
    /// Whether the caller intends to install a monitoring hooks
    /// implementation (surfaced to collaborators; null hooks otherwise).
    pub monitoring_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: DEFAULT_THREAD_POOL_SIZE,
            execution_timeout: None,
            monitoring_enabled: false,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    rlx_core::setters! {
        set {
            thread_pool_size: usize,
            monitoring_enabled: bool,
        }
        option {
            execution_timeout: Duration,
        }
    }

    /// Read overrides from `ROUTILUX_THREAD_POOL_SIZE`,
    /// `ROUTILUX_EXECUTION_TIMEOUT` (seconds), and
    /// `ROUTILUX_ENABLE_MONITORING`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = read_env("ROUTILUX_THREAD_POOL_SIZE").and_then(|v| v.parse().ok()) {
            config.thread_pool_size = size;
        }
        if let Some(secs) = read_env("ROUTILUX_EXECUTION_TIMEOUT").and_then(|v| v.parse::<f64>().ok())
        {
            if secs > 0.0 {
                config.execution_timeout = Some(Duration::from_secs_f64(secs));
            }
        }
        if let Some(flag) = read_env("ROUTILUX_ENABLE_MONITORING") {
            config.monitoring_enabled =
                matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        config
    }

    pub(crate) fn validate(&self) -> Result<(), RuntimeError> {
        if self.thread_pool_size == 0 {
            return Err(RuntimeError::InvalidConfig(
                "thread_pool_size must be at least 1".into(),
            ));
        }
        if self.thread_pool_size > POOL_SIZE_WARN_THRESHOLD {
            tracing::warn!(
                thread_pool_size = self.thread_pool_size,
                "thread_pool_size is unusually large, may cause resource issues"
            );
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
