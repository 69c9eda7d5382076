//! # Host Bridge Traits
//!
//! Platform abstraction traits that the resource engine needs from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the engine and platform-specific
//! implementations. Each trait represents a capability that the engine requires
//! but that must be provided differently per platform or swapped for a fake in
//! tests.
//!
//! ## Traits
//!
//! - [`FolderWatcher`](watch::FolderWatcher) - Filesystem change notifications for managed folders
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ notify-based watcher |
//!
//! ## Fail-Fast Strategy
//!
//! The engine fails fast with a descriptive error when a required capability is
//! missing:
//!
//! ```ignore
//! let watcher = config.folder_watcher
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "FolderWatcher".to_string(),
//!         message: "No folder watcher provided. \
//!                  Desktop: enable the 'desktop-shims' feature.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it and include the affected path in the
//! message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks and watcher threads.

pub mod error;
pub mod logging;
pub mod watch;

pub use error::BridgeError;

pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use watch::{ChangeKind, ChangeNotice, ChangeSink, FolderWatcher, WatchGuard};
