// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error-handling policy attached to a routine or a flow.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when routine logic (or an activation policy) fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    /// Fail the job and abandon remaining work.
    Stop,
    /// Record the error and keep going; the activation counts as
    /// completed-with-error.
    Continue,
    /// Drop the activation silently; the routine is marked skipped.
    Skip,
    /// Re-invoke the logic with exponential backoff, then fall through to
    /// STOP on final failure.
    Retry,
}

crate::simple_display! {
    ErrorStrategy {
        Stop => "stop",
        Continue => "continue",
        Skip => "skip",
        Retry => "retry",
    }
}

/// Policy object resolved per failure: routine handler → flow handler →
/// default STOP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorHandler {
    pub strategy: ErrorStrategy,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay before the first retry, in seconds.
    #[serde(default = "default_retry_delay", rename = "retry_delay")]
    pub retry_delay_secs: f64,
    /// Multiplicative backoff applied per attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: f64,
    #[serde(default)]
    pub is_critical: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_retry_backoff() -> f64 {
    2.0
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::stop()
    }
}

impl ErrorHandler {
    pub fn new(strategy: ErrorStrategy) -> Self {
        Self {
            strategy,
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay(),
            retry_backoff: default_retry_backoff(),
            is_critical: false,
        }
    }

    pub fn stop() -> Self {
        Self::new(ErrorStrategy::Stop)
    }

    pub fn continue_() -> Self {
        Self::new(ErrorStrategy::Continue)
    }

    pub fn skip() -> Self {
        Self::new(ErrorStrategy::Skip)
    }

    pub fn retry(max_retries: u32) -> Self {
        let mut handler = Self::new(ErrorStrategy::Retry);
        handler.max_retries = max_retries;
        handler
    }

    crate::setters! {
        set {
            max_retries: u32,
            retry_delay_secs: f64,
            retry_backoff: f64,
            is_critical: bool,
        }
    }

    /// Delay to wait after the `failed_attempts`-th failed attempt
    /// (1-based): `retry_delay * retry_backoff^(failed_attempts - 1)`.
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(63);
        let factor = self.retry_backoff.max(0.0).powi(exponent as i32);
        Duration::from_secs_f64((self.retry_delay_secs.max(0.0) * factor).min(86_400.0))
    }
}

#[cfg(test)]
#[path = "error_handler_tests.rs"]
mod tests;
