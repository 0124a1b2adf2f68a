// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Panic-guarded hook invocation.
//!
//! Hook implementations are foreign code; a panicking hook must never
//! reach engine control flow. Failures are logged and the default value
//! stands in for the hook's answer.

use std::panic::{catch_unwind, AssertUnwindSafe};

pub(crate) fn call<T>(name: &str, default: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(hook = name, "hook panicked; continuing with default");
            default
        }
    }
}
