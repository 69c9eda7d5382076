//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `FolderWatcher` using the `notify` crate's recommended backend
//!   (inotify, FSEvents, ReadDirectoryChangesW)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::NotifyFolderWatcher;
//! use bridge_traits::FolderWatcher;
//! use std::sync::Arc;
//!
//! let watcher: Arc<dyn FolderWatcher> = Arc::new(NotifyFolderWatcher::new());
//! // Hand it to EngineConfig::builder().folder_watcher(watcher)
//! ```

mod watcher;

pub use watcher::NotifyFolderWatcher;
