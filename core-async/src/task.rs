//! Task spawning and execution.
//!
//! - `spawn`: runs a future on the current Tokio runtime
//! - `spawn_blocking`: runs filesystem or archive work on the blocking thread pool
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//!
//! async fn example() {
//!     let handle = task::spawn(async { 42 });
//!     assert_eq!(handle.await.unwrap(), 42);
//!
//!     let listing = task::spawn_blocking(|| std::fs::read_dir(".").map(|d| d.count()));
//!     assert!(listing.await.unwrap().is_ok());
//! }
//! ```

pub use tokio::task::{spawn_blocking, yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the Tokio runtime.
///
/// The spawned task may run on a different thread. Must be called from within
/// a runtime context.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, JoinError>;
