//! Synchronization primitives.
//!
//! Re-exports Tokio's async-aware primitives together with the cooperative
//! [`CancellationToken`] used to abort background parse work.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{mpsc, CancellationToken};
//!
//! async fn example() {
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let token = CancellationToken::new();
//!
//!     tx.send(token.is_cancelled()).ok();
//!     token.cancel();
//!
//!     assert_eq!(rx.recv().await, Some(false));
//!     assert!(token.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, Mutex, MutexGuard, Notify, OwnedSemaphorePermit, RwLock,
    Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::CancellationToken;
