//! Async primitives for the resource engine.
//!
//! This crate wraps the Tokio runtime behind a small, stable surface so that the
//! engine crates never reach for Tokio directly. It also owns the
//! [`WorkerPool`](pool::WorkerPool), the bounded pool of blocking workers that
//! scans directories and parses archives off the model context.
//!
//! # Modules
//!
//! - `task`: Task spawning and execution
//! - `time`: Time-related operations (sleep, timeout, duration, instant)
//! - `sync`: Synchronization primitives (channels, semaphores, cancellation)
//! - `pool`: Bounded worker pool for blocking filesystem and archive work
//!
//! # Examples
//!
//! ```rust
//! use core_async::pool::WorkerPool;
//!
//! async fn example() {
//!     let pool = WorkerPool::new(4);
//!     let size = pool
//!         .run(|| std::fs::metadata("Cargo.toml").map(|m| m.len()))
//!         .await;
//!     assert!(size.is_ok());
//! }
//! ```

pub mod pool;
pub mod sync;
pub mod task;
pub mod time;

pub use pool::{PoolError, WorkerPool};
pub use task::spawn;
pub use time::{sleep, Duration, Instant};
