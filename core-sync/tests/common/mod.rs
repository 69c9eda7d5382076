//! Shared fixtures for the folder model tests
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, SystemTime};

use bridge_traits::{ChangeSink, FolderWatcher, WatchGuard};
use core_async::pool::WorkerPool;
use core_async::sync::CancellationToken;
use core_metadata::{FolderKind, ParseRequest, ResourceDetails, ResourceParser};
use core_runtime::events::EventBus;
use core_sync::{FolderConfig, MetadataIndex, MetadataRecord, ResourceFolderModel};
use zip::write::SimpleFileOptions;

mockall::mock! {
    pub Watcher {}

    impl FolderWatcher for Watcher {
        fn watch(&self, path: &Path, sink: ChangeSink) -> bridge_traits::error::Result<WatchGuard>;
    }
}

mockall::mock! {
    pub Parser {}

    impl ResourceParser for Parser {
        fn parse(&self, request: &ParseRequest, cancel: &CancellationToken) -> core_metadata::Result<ResourceDetails>;
    }
}

/// Watcher that accepts every path and never reports anything.
pub fn quiet_watcher() -> Arc<dyn FolderWatcher> {
    let mut watcher = MockWatcher::new();
    watcher
        .expect_watch()
        .returning(|path, _| Ok(WatchGuard::detached(path)));
    Arc::new(watcher)
}

/// Watcher that keeps every sink it is given so tests can fire notices.
pub fn capturing_watcher() -> (Arc<dyn FolderWatcher>, Arc<Mutex<Vec<ChangeSink>>>) {
    let sinks: Arc<Mutex<Vec<ChangeSink>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&sinks);

    let mut watcher = MockWatcher::new();
    watcher.expect_watch().returning(move |path, sink| {
        captured.lock().unwrap().push(sink);
        Ok(WatchGuard::detached(path))
    });
    (Arc::new(watcher), sinks)
}

/// Parser that names each resource after its id in upper case.
pub struct EchoParser;

impl ResourceParser for EchoParser {
    fn parse(
        &self,
        request: &ParseRequest,
        _cancel: &CancellationToken,
    ) -> core_metadata::Result<ResourceDetails> {
        Ok(ResourceDetails {
            name: Some(request.resource_id.to_uppercase()),
            version: Some("1.0".to_string()),
            ..Default::default()
        })
    }
}

/// Parser that blocks every call until [`open`](Self::open) is called.
///
/// It ignores its cancellation token, so a cancelled task still completes
/// and delivers a late result.
#[derive(Default)]
pub struct GatedParser {
    started: AtomicUsize,
    open: Mutex<bool>,
    signal: Condvar,
}

impl GatedParser {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.signal.notify_all();
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Polls until `count` parses have started.
    pub async fn wait_started(&self, count: usize) {
        for _ in 0..500 {
            if self.started() >= count {
                return;
            }
            core_async::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("only {} of {} parses started", self.started(), count);
    }
}

impl ResourceParser for GatedParser {
    fn parse(
        &self,
        request: &ParseRequest,
        _cancel: &CancellationToken,
    ) -> core_metadata::Result<ResourceDetails> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let guard = self.open.lock().unwrap();
        // Bounded so a forgotten open() fails the test instead of hanging it
        let _open = self
            .signal
            .wait_timeout_while(guard, Duration::from_secs(10), |open| !*open)
            .unwrap();

        Ok(ResourceDetails {
            name: Some(format!("parsed {}", request.resource_id)),
            ..Default::default()
        })
    }
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub events: EventBus,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::TempDir::new().unwrap(),
            events: EventBus::new(1024),
        }
    }

    pub fn folder(&self) -> PathBuf {
        self.dir.path().join("mods")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.folder().join(".index")
    }

    pub fn config(&self) -> FolderConfig {
        FolderConfig::new(self.folder(), FolderKind::Mods).with_indexed(true)
    }

    pub fn model(&self, parser: Arc<dyn ResourceParser>) -> ResourceFolderModel {
        self.model_with(parser, quiet_watcher())
    }

    pub fn model_with(
        &self,
        parser: Arc<dyn ResourceParser>,
        watcher: Arc<dyn FolderWatcher>,
    ) -> ResourceFolderModel {
        ResourceFolderModel::builder(self.config())
            .worker_pool(WorkerPool::new(2).with_name("test"))
            .parser(parser)
            .folder_watcher(watcher)
            .event_bus(self.events.clone())
            .build()
            .unwrap()
    }

    /// Creates a file in the managed folder.
    pub fn touch(&self, name: &str) -> PathBuf {
        fs::create_dir_all(self.folder()).unwrap();
        let path = self.folder().join(name);
        fs::write(&path, name).unwrap();
        path
    }

    /// Creates a file outside the managed folder.
    pub fn outside(&self, name: &str, contents: &str) -> PathBuf {
        let staging = self.dir.path().join("downloads");
        fs::create_dir_all(&staging).unwrap();
        let path = staging.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// Writes a jar into the managed folder.
    pub fn jar(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        fs::create_dir_all(self.folder()).unwrap();
        let path = self.folder().join(name);
        let mut writer = zip::ZipWriter::new(fs::File::create(&path).unwrap());
        for (entry, contents) in entries {
            writer.start_file(*entry, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    pub fn record(&self, filename: &str) -> MetadataRecord {
        let record = MetadataRecord::new(filename, filename, "modrinth", filename, "v1");
        MetadataIndex::new(self.index_dir()).write(&record).unwrap();
        record
    }

    pub fn records(&self) -> Vec<String> {
        MetadataIndex::new(self.index_dir())
            .read_all()
            .unwrap()
            .into_iter()
            .map(|record| record.filename)
            .collect()
    }
}

/// Moves a file's modification time so the next scan sees it as changed.
pub fn bump_mtime(path: &Path, seconds: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(seconds))
        .unwrap();
}

pub fn ids(model: &ResourceFolderModel) -> Vec<String> {
    model.index().ids().map(str::to_string).collect()
}
