//! # Engine Configuration Module
//!
//! Provides configuration management for the resource engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `EngineConfig` holding the capabilities and limits shared by every folder
//! model: the size of the dedicated worker pool, the event buffer, and the
//! folder watcher used to observe external edits. Validation is fail-fast so a
//! misconfigured host learns about it at startup rather than on first scan.
//!
//! ## Required Dependencies
//!
//! - `FolderWatcher` - Filesystem change notifications (desktop default: notify)
//!
//! When the `desktop-shims` feature is enabled, `NotifyFolderWatcher` is
//! injected automatically if no watcher was provided.
//!
//! ## Usage
//!
//! ### Desktop defaults
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//!
//! let config = EngineConfig::builder()
//!     .worker_count(4)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ### Custom watcher
//!
//! ```ignore
//! use core_runtime::config::EngineConfig;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::builder()
//!     .worker_count(2)
//!     .event_buffer_size(512)
//!     .folder_watcher(Arc::new(MyWatcher::default()))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! Without the `desktop-shims` feature and without an injected watcher,
//! `build()` returns [`Error::CapabilityMissing`] with an actionable message.

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::FolderWatcher;
use std::sync::Arc;

/// Upper bound on the worker pool size.
///
/// Parsing is I/O bound; beyond this the pool only adds contention on the disk.
pub const MAX_WORKER_COUNT: usize = 64;

/// Default worker count: the machine's parallelism, capped at 8.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .clamp(1, 8)
}

/// Engine-wide configuration.
///
/// Use [`EngineConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct EngineConfig {
    /// Maximum number of concurrently running scan and parse jobs
    pub worker_count: usize,

    /// Capacity of the event bus broadcast channel
    pub event_buffer_size: usize,

    /// Filesystem change notification source (required)
    pub folder_watcher: Arc<dyn FolderWatcher>,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("worker_count", &self.worker_count)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("folder_watcher", &"<dyn FolderWatcher>")
            .finish()
    }
}

impl EngineConfig {
    /// Creates a new builder for constructing an `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Worker count is between 1 and [`MAX_WORKER_COUNT`]
    /// - Event buffer size is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config(
                "Worker count must be at least 1".to_string(),
            ));
        }

        if self.worker_count > MAX_WORKER_COUNT {
            return Err(Error::Config(format!(
                "Worker count {} exceeds maximum of {}",
                self.worker_count, MAX_WORKER_COUNT
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn folder_watcher_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FolderWatcher".to_string(),
        message: "FolderWatcher implementation is required to observe managed folders. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default NotifyFolderWatcher. \
                 Tests: inject a fake watcher through EngineConfig::builder().folder_watcher()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_folder_watcher() -> Result<Arc<dyn FolderWatcher>> {
    use bridge_desktop::NotifyFolderWatcher;

    let watcher: Arc<dyn FolderWatcher> = Arc::new(NotifyFolderWatcher::new());
    Ok(watcher)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_folder_watcher() -> Result<Arc<dyn FolderWatcher>> {
    Err(folder_watcher_missing_error())
}

/// Builder for constructing [`EngineConfig`] instances.
#[derive(Default)]
pub struct EngineConfigBuilder {
    worker_count: Option<usize>,
    event_buffer_size: Option<usize>,
    folder_watcher: Option<Arc<dyn FolderWatcher>>,
}

impl EngineConfigBuilder {
    /// Sets the worker pool size.
    ///
    /// Defaults to [`default_worker_count`].
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    /// Sets the event bus capacity.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Injects the folder watcher implementation.
    pub fn folder_watcher(mut self, watcher: Arc<dyn FolderWatcher>) -> Self {
        self.folder_watcher = Some(watcher);
        self
    }

    /// Builds the final `EngineConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if no watcher was provided and no
    ///   platform default is available
    /// - [`Error::Config`] if a value is out of range
    pub fn build(self) -> Result<EngineConfig> {
        let folder_watcher = match self.folder_watcher {
            Some(watcher) => watcher,
            None => provide_default_folder_watcher()?,
        };

        let config = EngineConfig {
            worker_count: self.worker_count.unwrap_or_else(default_worker_count),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            folder_watcher,
        };

        config.validate()?;

        Ok(config)
    }
}
