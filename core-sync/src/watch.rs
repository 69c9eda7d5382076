//! Filesystem notifications for one managed folder.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, trace};

use bridge_traits::{ChangeNotice, ChangeSink, FolderWatcher, WatchGuard};
use core_async::sync::mpsc;

use crate::error::Result;
use crate::message::ModelMessage;

/// Owns the watch guards for a folder and its side-car index.
///
/// Dropping the controller (or calling [`stop`](Self::stop)) detaches the
/// watches.
pub struct WatchController {
    watcher: Arc<dyn FolderWatcher>,
    guards: Vec<WatchGuard>,
}

impl WatchController {
    pub fn new(watcher: Arc<dyn FolderWatcher>) -> Self {
        Self {
            watcher,
            guards: Vec::new(),
        }
    }

    /// Watches `dir`, and `index_dir` when it exists.
    ///
    /// Watches are not recursive, so an index inside `dir` gets its own.
    ///
    /// Every notification is forwarded to `sender` as
    /// [`ModelMessage::FilesystemChanged`]. Returns `Ok(false)` if the
    /// controller is already watching.
    pub fn start(
        &mut self,
        dir: &Path,
        index_dir: Option<&Path>,
        sender: mpsc::UnboundedSender<ModelMessage>,
    ) -> Result<bool> {
        if self.is_watching() {
            return Ok(false);
        }

        let sink: ChangeSink = Arc::new(move |notice: ChangeNotice| {
            trace!(watched = %notice.watched.display(), kind = ?notice.kind, "Change notice");
            // Closed receiver means the model is shutting down
            let _ = sender.send(ModelMessage::FilesystemChanged(notice));
        });

        let mut guards = vec![self.watcher.watch(dir, Arc::clone(&sink))?];
        if let Some(index_dir) = index_dir.filter(|d| d.is_dir()) {
            guards.push(self.watcher.watch(index_dir, sink)?);
        }

        debug!(dir = %dir.display(), watches = guards.len(), "Attached folder watch");
        self.guards = guards;
        Ok(true)
    }

    /// Detaches all watches. Returns `false` if nothing was watched.
    pub fn stop(&mut self) -> bool {
        if self.guards.is_empty() {
            return false;
        }
        self.guards.clear();
        true
    }

    pub fn is_watching(&self) -> bool {
        !self.guards.is_empty()
    }
}

impl std::fmt::Debug for WatchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchController")
            .field("guards", &self.guards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::ChangeKind;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    mockall::mock! {
        FolderWatcher {}

        impl FolderWatcher for FolderWatcher {
            fn watch(&self, path: &Path, sink: ChangeSink) -> bridge_traits::error::Result<WatchGuard>;
        }
    }

    #[tokio::test]
    async fn test_start_forwards_notices_and_stop_detaches() {
        let dir = TempDir::new().unwrap();
        let captured: Arc<Mutex<Option<ChangeSink>>> = Arc::new(Mutex::new(None));

        let mut watcher = MockFolderWatcher::new();
        let slot = Arc::clone(&captured);
        watcher.expect_watch().times(1).returning(move |path, sink| {
            *slot.lock().unwrap() = Some(sink);
            Ok(WatchGuard::detached(path))
        });

        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut controller = WatchController::new(Arc::new(watcher));

        assert!(controller.start(dir.path(), None, sender.clone()).unwrap());
        assert!(!controller.start(dir.path(), None, sender).unwrap());
        assert!(controller.is_watching());

        let sink = captured.lock().unwrap().clone().unwrap();
        sink(ChangeNotice::new(dir.path(), ChangeKind::Created).with_path(dir.path().join("a.jar")));
        assert!(matches!(
            receiver.recv().await,
            Some(ModelMessage::FilesystemChanged(_))
        ));

        assert!(controller.stop());
        assert!(!controller.stop());
    }

    #[test]
    fn test_index_directory_gets_its_own_watch() {
        let dir = TempDir::new().unwrap();
        let index_dir = dir.path().join(".index");
        std::fs::create_dir(&index_dir).unwrap();

        let mut watcher = MockFolderWatcher::new();
        watcher
            .expect_watch()
            .times(2)
            .returning(|path, _| Ok(WatchGuard::detached(path)));

        let (sender, _receiver) = mpsc::unbounded_channel();
        let mut controller = WatchController::new(Arc::new(watcher));
        controller.start(dir.path(), Some(&index_dir), sender).unwrap();
        assert_eq!(controller.guards.len(), 2);
    }
}
