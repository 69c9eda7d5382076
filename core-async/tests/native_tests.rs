//! Integration tests for core-async.
//!
//! These tests verify the Tokio re-exports and the worker pool's concurrency
//! bound.

use core_async::pool::WorkerPool;
use core_async::{sync, task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn test_task_spawn_blocking() {
    let handle = task::spawn_blocking(|| {
        std::thread::sleep(std::time::Duration::from_millis(10));
        100
    });
    let result = handle.await.unwrap();
    assert_eq!(result, 100);
}

#[tokio::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_cancellation_token_is_shared_between_clones() {
    let token = sync::CancellationToken::new();
    let observer = token.clone();

    let handle = task::spawn_blocking(move || {
        while !observer.is_cancelled() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        "stopped"
    });

    token.cancel();
    assert_eq!(handle.await.unwrap(), "stopped");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pool_never_exceeds_worker_limit() {
    let pool = WorkerPool::new(2).with_name("bounded");
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
                i
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let mut values: Vec<usize> = results
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();
    values.sort_unstable();

    assert_eq!(values, (0..8).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(pool.running(), 0);
    assert_eq!(pool.queued(), 0);
}

#[tokio::test]
async fn test_pool_clones_share_permits() {
    let pool = WorkerPool::new(1);
    let clone = pool.clone();

    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let blocker = pool.submit(move || {
        release_rx.recv().ok();
    });

    // Wait for the first job to occupy the only worker
    while pool.running() == 0 {
        time::sleep(time::Duration::from_millis(1)).await;
    }

    let waiting = clone.submit(|| 7);
    while clone.queued() == 0 {
        time::sleep(time::Duration::from_millis(1)).await;
    }
    assert_eq!(pool.queued(), 1);

    release_tx.send(()).unwrap();
    blocker.await.unwrap().unwrap();
    assert_eq!(waiting.await.unwrap().unwrap(), 7);
}
