// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[tokio::test]
async fn permits_bound_concurrency() {
    let pool = WorkerPool::new(2);
    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();
    assert_eq!(pool.available(), 0);

    // A third acquisition waits until a permit is released.
    let waiting = tokio::time::timeout(Duration::from_millis(20), pool.acquire()).await;
    assert!(waiting.is_err(), "third acquire should not complete while pool is full");

    drop(first);
    let third = tokio::time::timeout(Duration::from_millis(100), pool.acquire()).await;
    assert!(third.is_ok());
}

#[tokio::test]
async fn close_fails_pending_acquisitions() {
    let pool = WorkerPool::new(1);
    let held = pool.acquire().await.unwrap();

    let contender = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    pool.close();
    assert!(pool.is_closed());

    let result = contender.await.unwrap();
    assert!(result.is_err(), "queued acquire must fail once the pool closes");
    drop(held);
}

#[test]
fn zero_size_is_clamped() {
    let pool = WorkerPool::new(0);
    assert_eq!(pool.size(), 1);
}
