//! # Bounded Worker Pool
//!
//! A dedicated pool of blocking workers with a fixed concurrency limit.
//!
//! ## Overview
//!
//! Directory scans and archive parsing block on filesystem I/O. Submitting them
//! straight to `spawn_blocking` would let a folder with thousands of archives
//! open thousands of files at once, so every job first acquires a permit from a
//! [`Semaphore`] sized to `max_workers`. Jobs beyond the limit wait in FIFO
//! order until a worker frees up.
//!
//! The pool is cheap to clone; clones share the same permits. Each folder model
//! receives its pool at construction time, so unrelated subsystems never share
//! one implicitly.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_async::pool::WorkerPool;
//!
//! let pool = WorkerPool::new(4).with_name("mods");
//!
//! // Await the result in place
//! let entries = pool.run(|| std::fs::read_dir("/tmp").map(|d| d.count())).await?;
//!
//! // Or detach and collect the handle later
//! let handle = pool.submit(|| expensive_parse());
//! let parsed = handle.await??;
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::sync::Semaphore;
use crate::task::{self, JoinHandle};

/// Errors produced while running a job on the pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker pool '{0}' has been shut down")]
    Closed(String),

    #[error("Worker job panicked: {0}")]
    Panicked(String),

    #[error("Worker job was cancelled by the runtime")]
    Aborted,
}

struct PoolInner {
    name: String,
    permits: Arc<Semaphore>,
    max_workers: usize,
    queued: AtomicUsize,
    running: AtomicUsize,
}

/// Decrements a pool counter when dropped, even if the job future is dropped
/// mid-wait.
struct CounterGuard<'a>(&'a AtomicUsize);

impl<'a> CounterGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded pool of blocking workers.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Creates a pool that runs at most `max_workers` jobs at once.
    ///
    /// A value of zero is raised to one so the pool can always make progress.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            inner: Arc::new(PoolInner {
                name: "workers".to_string(),
                permits: Arc::new(Semaphore::new(max_workers)),
                max_workers,
                queued: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns a pool with the same limit but a different name.
    ///
    /// Must be called before the pool is cloned; a fresh semaphore is created.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        let max_workers = self.inner.max_workers;
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                permits: Arc::new(Semaphore::new(max_workers)),
                max_workers,
                queued: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
            }),
        }
    }

    /// Pool name used in error messages and logs.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Maximum number of concurrently running jobs.
    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Jobs currently executing on a worker.
    pub fn running(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Jobs waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Runs `work` on a blocking worker once a permit is available and returns
    /// its result.
    ///
    /// # Errors
    ///
    /// - [`PoolError::Closed`] if the pool was shut down before the job started
    /// - [`PoolError::Panicked`] if the job panicked
    /// - [`PoolError::Aborted`] if the runtime cancelled the blocking task
    pub async fn run<F, T>(&self, work: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = {
            let _queued = CounterGuard::enter(&self.inner.queued);
            Arc::clone(&self.inner.permits).acquire_owned().await
        };
        let _permit = permit.map_err(|_| PoolError::Closed(self.inner.name.clone()))?;
        let _running = CounterGuard::enter(&self.inner.running);

        task::spawn_blocking(work).await.map_err(|err| {
            if err.is_panic() {
                PoolError::Panicked(panic_message(err.into_panic()))
            } else {
                PoolError::Aborted
            }
        })
    }

    /// Detached variant of [`run`](Self::run): the job is queued immediately
    /// and the returned handle resolves to its result.
    pub fn submit<F, T>(&self, work: F) -> JoinHandle<Result<T, PoolError>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.clone();
        task::spawn(async move { pool.run(work).await })
    }

    /// Stops accepting work. Jobs already running finish normally; queued jobs
    /// fail with [`PoolError::Closed`].
    pub fn shutdown(&self) {
        self.inner.permits.close();
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.inner.name)
            .field("max_workers", &self.inner.max_workers)
            .field("running", &self.running())
            .field("queued", &self.queued())
            .finish()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_workers_is_raised_to_one() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.max_workers(), 1);
    }

    #[test]
    fn test_with_name_keeps_limit() {
        let pool = WorkerPool::new(3).with_name("mods");
        assert_eq!(pool.name(), "mods");
        assert_eq!(pool.max_workers(), 3);
    }

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let pool = WorkerPool::new(2);
        let value = pool.run(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.running(), 0);
        assert_eq!(pool.queued(), 0);
    }

    #[tokio::test]
    async fn test_panicking_job_is_reported() {
        let pool = WorkerPool::new(1);
        let result: Result<(), PoolError> = pool.run(|| panic!("corrupt archive")).await;
        assert_eq!(
            result,
            Err(PoolError::Panicked("corrupt archive".to_string()))
        );

        // The permit is released even after a panic
        assert_eq!(pool.run(|| 1).await, Ok(1));
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_work() {
        let pool = WorkerPool::new(1).with_name("packs");
        pool.shutdown();
        assert!(pool.is_closed());
        assert_eq!(
            pool.run(|| ()).await,
            Err(PoolError::Closed("packs".to_string()))
        );
    }
}
