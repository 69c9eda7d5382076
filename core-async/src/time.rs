//! Time-related operations.

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
pub use tokio::time::error::Elapsed;
pub use tokio::time::{interval, sleep, timeout, Interval};
