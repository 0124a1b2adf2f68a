// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared worker pool bounding concurrent routine activations.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Fixed-size logical pool shared by every job and routine.
///
/// Each routine activation holds one permit for its whole run (including
/// retry attempts), so at most `size` activations execute at once
/// process-wide. Closing the pool makes queued acquisitions fail, which is
/// how not-yet-started activations are discarded at shutdown.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self { semaphore: Arc::new(Semaphore::new(size)), size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by running activations.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a worker slot. Fails once the pool is closed.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        Arc::clone(&self.semaphore).acquire_owned().await
    }

    /// Close the pool: queued and future acquisitions fail immediately.
    /// Permits already held stay valid until their activations finish.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
