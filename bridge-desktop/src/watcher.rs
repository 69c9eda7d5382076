//! Folder watching implementation using `notify`

use bridge_traits::{
    error::{BridgeError, Result},
    watch::{ChangeKind, ChangeNotice, ChangeSink, FolderWatcher, WatchGuard},
};
use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::Path;
use tracing::{debug, warn};

/// `notify`-backed folder watcher
///
/// Each call to [`watch`](FolderWatcher::watch) creates its own platform
/// watcher, owned by the returned guard. Dropping the guard unregisters the
/// watch and stops the backend thread.
///
/// Pure access events (open, read) are discarded: scanning a folder opens
/// every archive in it and must not trigger another scan.
#[derive(Debug, Clone, Default)]
pub struct NotifyFolderWatcher {
    recursive: bool,
}

impl NotifyFolderWatcher {
    /// Watcher reporting direct children only
    pub fn new() -> Self {
        Self::default()
    }

    /// Also report changes inside subdirectories
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

impl FolderWatcher for NotifyFolderWatcher {
    fn watch(&self, path: &Path, sink: ChangeSink) -> Result<WatchGuard> {
        if !path.is_dir() {
            return Err(BridgeError::NotAvailable(format!(
                "cannot watch {}: not a directory",
                path.display()
            )));
        }

        let watched = path.to_path_buf();
        let handler_root = watched.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(kind) = classify(&event.kind) {
                    let mut notice = ChangeNotice::new(handler_root.clone(), kind);
                    notice.paths = event.paths;
                    sink(notice);
                }
            }
            Err(err) => {
                warn!(path = %handler_root.display(), error = %err, "Folder watcher error");
            }
        })
        .map_err(|e| BridgeError::OperationFailed(format!("Failed to create watcher: {}", e)))?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        watcher.watch(&watched, mode).map_err(|e| {
            BridgeError::OperationFailed(format!(
                "Failed to watch {}: {}",
                watched.display(),
                e
            ))
        })?;

        debug!(path = %watched.display(), recursive = self.recursive, "Started folder watch");
        Ok(WatchGuard::new(watched, watcher))
    }
}

fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Some(ChangeKind::Modified),
        EventKind::Access(_) => None,
        EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, RemoveKind, RenameMode};

    #[test]
    fn test_classify_maps_structural_events() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::Folder)),
            Some(ChangeKind::Removed)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(ChangeKind::Renamed)
        );
    }

    #[test]
    fn test_classify_ignores_reads() {
        assert_eq!(classify(&EventKind::Access(AccessKind::Read)), None);
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Open(AccessMode::Read))),
            None
        );
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Close(AccessMode::Write))),
            Some(ChangeKind::Modified)
        );
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let watcher = NotifyFolderWatcher::new();
        let sink: ChangeSink = std::sync::Arc::new(|_| {});
        let result = watcher.watch(Path::new("/definitely/not/here"), sink);
        assert!(matches!(result, Err(BridgeError::NotAvailable(_))));
    }
}
