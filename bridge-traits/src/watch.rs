//! Folder Watching Abstractions
//!
//! The engine reacts to external edits of a managed folder (a user dropping a
//! jar in, a download finishing, another tool deleting a pack). Hosts provide
//! the notification source through [`FolderWatcher`]; the engine only needs to
//! know *that* something changed, since every notice results in a full rescan.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of change reported by a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Renamed,
    Other,
}

/// A single filesystem change inside a watched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    /// The directory passed to [`FolderWatcher::watch`].
    pub watched: PathBuf,
    /// Affected paths, when the platform reports them.
    pub paths: Vec<PathBuf>,
    pub kind: ChangeKind,
}

impl ChangeNotice {
    pub fn new(watched: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            watched: watched.into(),
            paths: Vec::new(),
            kind,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }
}

/// Callback receiving change notices.
///
/// Called from the watcher's own thread; implementations must hand the notice
/// off (for example over a channel) instead of doing work inline.
pub type ChangeSink = Arc<dyn Fn(ChangeNotice) + Send + Sync>;

/// Keeps a watch alive. Dropping the guard stops notifications for its path.
pub struct WatchGuard {
    path: PathBuf,
    _inner: Option<Box<dyn Any + Send>>,
}

impl WatchGuard {
    /// Wraps the platform handle whose lifetime bounds the watch.
    pub fn new<T: Any + Send>(path: impl Into<PathBuf>, inner: T) -> Self {
        Self {
            path: path.into(),
            _inner: Some(Box::new(inner)),
        }
    }

    /// A guard with no platform handle attached, for watchers that have
    /// nothing to release.
    pub fn detached(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _inner: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchGuard")
            .field("path", &self.path)
            .finish()
    }
}

/// Filesystem change notification source.
///
/// # Contract
///
/// - Only direct children of `path` need to be reported; subdirectories of
///   folder resources are not watched.
/// - Notices may be coalesced or duplicated. The engine tolerates both.
/// - The watch lasts until the returned [`WatchGuard`] is dropped.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::watch::{FolderWatcher, ChangeSink};
/// use std::sync::Arc;
///
/// let sink: ChangeSink = Arc::new(move |notice| {
///     tx.send(notice).ok();
/// });
/// let guard = watcher.watch(Path::new("/instances/a/mods"), sink)?;
/// // ... later
/// drop(guard);
/// ```
pub trait FolderWatcher: Send + Sync {
    /// Starts delivering change notices for `path` to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist or the platform refuses to
    /// register the watch.
    fn watch(&self, path: &Path, sink: ChangeSink) -> Result<WatchGuard>;
}
