//! # Resource Folder Model
//!
//! Single-writer owner of one managed folder's [`ResourceIndex`].
//!
//! ## Overview
//!
//! The model ties the pieces together:
//! - [`update`](ResourceFolderModel::update) dispatches a [`ScanRequest`] to
//!   the worker pool; overlapping requests collapse into one trailing scan
//! - finished scans are merged by the [`reconciler`](crate::reconciler)
//! - new and changed rows are handed to the [`ResolutionScheduler`]
//! - the [`WatchController`] turns filesystem notices into updates
//!
//! Background work never touches the index. Results come back as
//! [`ModelMessage`]s which the owner feeds to
//! [`handle_message`](ResourceFolderModel::handle_message), either from its
//! own loop or through the `wait_for_*` helpers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{FolderConfig, ResourceFolderModel};
//! use core_metadata::FolderKind;
//!
//! let config = FolderConfig::new("/instances/a/mods", FolderKind::Mods).with_indexed(true);
//! let mut model = ResourceFolderModel::builder(config).build()?;
//!
//! model.start_watching()?;
//! model.wait_for_update().await;
//!
//! while let Some(message) = model.next_message().await {
//!     model.handle_message(message);
//! }
//! ```
//!
//! All methods that dispatch work must be called from within a Tokio runtime.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use bridge_traits::FolderWatcher;
use core_async::pool::WorkerPool;
use core_async::sync::{mpsc, CancellationToken};
use core_async::task;
use core_metadata::{default_parser, FolderKind, ResourceParser};
use core_runtime::config::{default_worker_count, EngineConfig};
use core_runtime::logging::display_path;
use core_runtime::events::{
    CoreEvent, EventBus, FolderEvent, ResolutionEvent, DEFAULT_EVENT_BUFFER_SIZE,
};

use crate::error::{Result, SyncError};
use crate::index::ResourceIndex;
use crate::message::{ModelMessage, ParseOutcome};
use crate::metadata::{MetadataIndex, MetadataRecord};
use crate::reconciler::{self, IndexChange, TicketCanceller};
use crate::resource::{enabled_file_name, opposite_file_name, EnableAction, Resource, SortKey};
use crate::scanner::{ScanRequest, Snapshot};
use crate::scheduler::{ResolutionScheduler, Ticket};
use crate::watch::WatchController;

/// Name of the default side-car index directory inside a managed folder.
pub const DEFAULT_INDEX_DIR: &str = ".index";

/// Description of one managed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderConfig {
    dir: PathBuf,
    kind: FolderKind,
    index_dir: PathBuf,
    is_indexed: bool,
    create_dir: bool,
}

impl FolderConfig {
    /// Unindexed folder with its index at `<dir>/.index`, created if missing.
    pub fn new(dir: impl Into<PathBuf>, kind: FolderKind) -> Self {
        let dir = dir.into();
        Self {
            index_dir: dir.join(DEFAULT_INDEX_DIR),
            dir,
            kind,
            is_indexed: false,
            create_dir: true,
        }
    }

    pub fn with_index_dir(mut self, index_dir: impl Into<PathBuf>) -> Self {
        self.index_dir = index_dir.into();
        self
    }

    /// Whether scans consult the side-car index.
    pub fn with_indexed(mut self, is_indexed: bool) -> Self {
        self.is_indexed = is_indexed;
        self
    }

    pub fn with_create_dir(mut self, create_dir: bool) -> Self {
        self.create_dir = create_dir;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn kind(&self) -> FolderKind {
        self.kind
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    pub fn is_indexed(&self) -> bool {
        self.is_indexed
    }

    pub fn create_dir(&self) -> bool {
        self.create_dir
    }

    /// Name used in events and logs: the directory name, or the folder kind.
    pub fn label(&self) -> String {
        self.dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.kind.to_string())
    }
}

/// Counters for the lifetime of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelStats {
    pub scans_started: u64,
    pub parses_started: u64,
    /// Parse completions dropped because their ticket was no longer live.
    pub stale_completions: u64,
}

/// Result of a multi-resource operation.
///
/// Every requested id ends up in exactly one of the two lists.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, SyncError)>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

#[derive(Debug)]
struct InFlightScan {
    generation: u64,
    clean_orphans: bool,
    cancel: CancellationToken,
}

/// Builder for [`ResourceFolderModel`].
pub struct ResourceFolderModelBuilder {
    config: FolderConfig,
    pool: Option<WorkerPool>,
    parser: Option<Arc<dyn ResourceParser>>,
    watcher: Option<Arc<dyn FolderWatcher>>,
    events: Option<EventBus>,
}

impl ResourceFolderModelBuilder {
    pub fn worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Overrides the parser chosen for the folder kind.
    pub fn parser(mut self, parser: Arc<dyn ResourceParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    pub fn folder_watcher(mut self, watcher: Arc<dyn FolderWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the model, creating the folder if configured to.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Config`] if no watcher was given and the platform
    ///   default is unavailable
    /// - [`SyncError::Io`] if the folder cannot be created
    pub fn build(self) -> Result<ResourceFolderModel> {
        let config = self.config;
        let label = config.label();

        let watcher = match self.watcher {
            Some(watcher) => watcher,
            None => EngineConfig::builder().build()?.folder_watcher,
        };
        let pool = self
            .pool
            .unwrap_or_else(|| WorkerPool::new(default_worker_count()).with_name(label.clone()));
        let parser = self.parser.unwrap_or_else(|| default_parser(config.kind()));
        let events = self
            .events
            .unwrap_or_else(|| EventBus::new(DEFAULT_EVENT_BUFFER_SIZE));

        if config.create_dir() {
            fs::create_dir_all(config.dir()).map_err(|e| SyncError::io(config.dir(), e))?;
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        debug!(folder = %label, dir = %display_path(config.dir()), workers = pool.max_workers(), "Created folder model");

        Ok(ResourceFolderModel {
            scheduler: ResolutionScheduler::new(pool.clone(), parser, sender.clone()),
            watch: WatchController::new(watcher),
            index: ResourceIndex::new(),
            pool,
            events,
            sender,
            receiver,
            in_flight: None,
            scan_generation: 0,
            rescan_requested: false,
            first_folder_load: false,
            stats: ModelStats::default(),
            label,
            config,
        })
    }
}

/// Live view of one managed folder.
pub struct ResourceFolderModel {
    config: FolderConfig,
    label: String,
    index: ResourceIndex,
    scheduler: ResolutionScheduler,
    watch: WatchController,
    pool: WorkerPool,
    events: EventBus,
    sender: mpsc::UnboundedSender<ModelMessage>,
    receiver: mpsc::UnboundedReceiver<ModelMessage>,
    in_flight: Option<InFlightScan>,
    scan_generation: u64,
    rescan_requested: bool,
    /// Set by `start_watching`; the next scan deletes orphaned records.
    first_folder_load: bool,
    stats: ModelStats,
}

impl ResourceFolderModel {
    pub fn builder(config: FolderConfig) -> ResourceFolderModelBuilder {
        ResourceFolderModelBuilder {
            config,
            pool: None,
            parser: None,
            watcher: None,
            events: None,
        }
    }

    /// Builds a model from shared engine settings.
    pub fn from_engine(config: FolderConfig, engine: &EngineConfig, events: EventBus) -> Result<Self> {
        let pool = WorkerPool::new(engine.worker_count).with_name(config.label());
        Self::builder(config)
            .worker_pool(pool)
            .folder_watcher(Arc::clone(&engine.folder_watcher))
            .event_bus(events)
            .build()
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Requests a rescan.
    ///
    /// Starts a scan and returns `true` if none is running. Otherwise marks a
    /// rescan as wanted and returns `false`; any number of such calls result
    /// in a single scan once the current one has been reconciled.
    pub fn update(&mut self) -> bool {
        if self.in_flight.is_some() {
            if !self.rescan_requested {
                debug!(folder = %self.label, "Scan in flight, queueing rescan");
            }
            self.rescan_requested = true;
            return false;
        }
        self.start_scan();
        true
    }

    fn start_scan(&mut self) {
        self.scan_generation += 1;
        let generation = self.scan_generation;
        let clean_orphans = std::mem::take(&mut self.first_folder_load);
        let cancel = CancellationToken::new();

        let request = ScanRequest {
            dir: self.config.dir().to_path_buf(),
            index_dir: self.config.index_dir().to_path_buf(),
            is_indexed: self.config.is_indexed(),
            clean_orphans,
        };

        self.in_flight = Some(InFlightScan {
            generation,
            clean_orphans,
            cancel: cancel.clone(),
        });
        self.stats.scans_started += 1;
        info!(folder = %self.label, generation, clean_orphans, "Update started");
        self.emit_folder(FolderEvent::UpdateStarted {
            folder: self.label.clone(),
            clean_orphans,
        });

        let pool = self.pool.clone();
        let sender = self.sender.clone();
        task::spawn(async move {
            let result = pool
                .run(move || request.run(&cancel))
                .await
                .map_err(SyncError::from)
                .and_then(|scan| scan);
            let _ = sender.send(ModelMessage::ScanFinished { generation, result });
        });
    }

    /// Applies one background result to the model.
    pub fn handle_message(&mut self, message: ModelMessage) {
        match message {
            ModelMessage::ScanFinished { generation, result } => self.on_scan_finished(generation, result),
            ModelMessage::ParseFinished {
                ticket,
                resource_id,
                outcome,
            } => self.on_parse_finished(ticket, &resource_id, outcome),
            ModelMessage::FilesystemChanged(notice) => {
                debug!(folder = %self.label, kind = ?notice.kind, paths = notice.paths.len(), "Folder changed");
                self.update();
            }
        }
    }

    fn on_scan_finished(&mut self, generation: u64, result: Result<Snapshot>) {
        let scan = match self.in_flight.take() {
            Some(scan) if scan.generation == generation => scan,
            other => {
                self.in_flight = other;
                debug!(folder = %self.label, generation, "Ignoring result of superseded scan");
                return;
            }
        };

        match result {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(err) => {
                error!(folder = %self.label, error = %err, "Update failed");
                if scan.clean_orphans {
                    self.first_folder_load = true;
                }
                self.emit_folder(FolderEvent::UpdateFailed {
                    folder: self.label.clone(),
                    message: err.to_string(),
                });
            }
        }

        if std::mem::take(&mut self.rescan_requested) {
            self.start_scan();
        } else {
            info!(folder = %self.label, rows = self.index.size(), "Update finished");
            self.emit_folder(FolderEvent::UpdateFinished {
                folder: self.label.clone(),
            });
        }
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        if snapshot.orphans_cleaned > 0 {
            info!(folder = %self.label, count = snapshot.orphans_cleaned, "Deleted orphaned metadata records");
            self.emit_folder(FolderEvent::OrphansCleaned {
                folder: self.label.clone(),
                count: snapshot.orphans_cleaned,
            });
        }

        let mut canceller = EventingCanceller {
            scheduler: &mut self.scheduler,
            cancelled: Vec::new(),
        };
        let outcome = reconciler::apply(&mut self.index, &mut canceller, snapshot.resources);
        let cancelled = canceller.cancelled;

        for (ticket, resource_id) in cancelled {
            self.emit(CoreEvent::Resolution(ResolutionEvent::Cancelled {
                folder: self.label.clone(),
                ticket: ticket.value(),
                resource_id,
            }));
        }

        for change in &outcome.changes {
            let folder = self.label.clone();
            let event = match *change {
                IndexChange::Changed { first, last } => FolderEvent::RowsChanged { folder, first, last },
                IndexChange::Removed { first, last } => FolderEvent::RowsRemoved { folder, first, last },
                IndexChange::Inserted { first, last } => FolderEvent::RowsInserted { folder, first, last },
            };
            self.emit_folder(event);
        }

        for id in &outcome.to_resolve {
            self.resolve(id);
        }

        debug!(
            folder = %self.label,
            inserted = outcome.inserted,
            removed = outcome.removed,
            changed = outcome.changed,
            "Snapshot reconciled"
        );
        self.emit_folder(FolderEvent::UpdateSucceeded {
            folder: self.label.clone(),
            inserted: outcome.inserted,
            removed: outcome.removed,
            changed: outcome.changed,
        });
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Starts a parse for the resource `id` if it needs one.
    fn resolve(&mut self, id: &str) -> Option<Ticket> {
        let row = self.index.row_of(id)?;
        let scheduler = &mut self.scheduler;
        let ticket = self.index.update_row(row, |resource| scheduler.resolve(resource))??;

        self.stats.parses_started += 1;
        self.emit(CoreEvent::Resolution(ResolutionEvent::Started {
            folder: self.label.clone(),
            ticket: ticket.value(),
            resource_id: id.to_string(),
        }));
        Some(ticket)
    }

    fn on_parse_finished(&mut self, ticket: Ticket, dispatched_id: &str, outcome: ParseOutcome) {
        let Some(resource_id) = self.scheduler.finish(ticket) else {
            self.stats.stale_completions += 1;
            debug!(folder = %self.label, ticket = %ticket, resource_id = %dispatched_id, "Ignoring completion for stale ticket");
            return;
        };

        // Rows move between dispatch and completion; look the row up again
        let Some(row) = self
            .index
            .row_of(&resource_id)
            .filter(|row| self.index.at(*row).and_then(Resource::ticket) == Some(ticket))
        else {
            self.stats.stale_completions += 1;
            debug!(folder = %self.label, ticket = %ticket, resource_id = %resource_id, "Resource no longer waits on ticket");
            return;
        };

        let folder = self.label.clone();
        let event = match outcome {
            ParseOutcome::Resolved(details) => {
                self.index.update_row(row, |resource| resource.set_resolved(details));
                ResolutionEvent::Resolved {
                    folder: folder.clone(),
                    ticket: ticket.value(),
                    resource_id,
                }
            }
            ParseOutcome::Failed(message) => {
                warn!(folder = %folder, ticket = %ticket, resource_id = %resource_id, error = %message, "Failed to parse resource");
                self.index.update_row(row, Resource::set_unresolved);
                ResolutionEvent::Failed {
                    folder: folder.clone(),
                    ticket: ticket.value(),
                    resource_id,
                    message,
                }
            }
            ParseOutcome::Cancelled => {
                self.index.update_row(row, Resource::set_unresolved);
                ResolutionEvent::Cancelled {
                    folder: folder.clone(),
                    ticket: ticket.value(),
                    resource_id,
                }
            }
        };

        self.emit_folder(FolderEvent::RowsChanged {
            folder: folder.clone(),
            first: row,
            last: row,
        });
        self.emit(CoreEvent::Resolution(event));

        if !self.scheduler.has_pending() {
            self.emit(CoreEvent::Resolution(ResolutionEvent::Settled { folder }));
        }
    }

    fn cancel_ticket(&mut self, ticket: Option<Ticket>) {
        let Some(ticket) = ticket else {
            return;
        };
        if let Some(resource_id) = self.scheduler.cancel(ticket) {
            self.emit(CoreEvent::Resolution(ResolutionEvent::Cancelled {
                folder: self.label.clone(),
                ticket: ticket.value(),
                resource_id,
            }));
        }
    }

    // ------------------------------------------------------------------
    // Driving the model
    // ------------------------------------------------------------------

    /// Waits for the next background result.
    pub async fn next_message(&mut self) -> Option<ModelMessage> {
        self.receiver.recv().await
    }

    /// Handles every result already queued without waiting. Returns how many
    /// were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    /// Handles results until no scan is running or queued.
    pub async fn wait_for_update(&mut self) {
        while self.is_updating() {
            match self.receiver.recv().await {
                Some(message) => self.handle_message(message),
                None => break,
            }
        }
    }

    /// Handles results until no scan and no parse is outstanding.
    pub async fn wait_for_idle(&mut self) {
        while self.is_updating() || self.scheduler.has_pending() {
            match self.receiver.recv().await {
                Some(message) => self.handle_message(message),
                None => break,
            }
        }
    }

    /// Channel that feeds [`handle_message`](Self::handle_message).
    pub fn sender(&self) -> mpsc::UnboundedSender<ModelMessage> {
        self.sender.clone()
    }

    // ------------------------------------------------------------------
    // Watching
    // ------------------------------------------------------------------

    /// Attaches filesystem notifications and schedules a scan that deletes
    /// orphaned metadata records.
    ///
    /// Returns `Ok(false)` if the folder is already watched.
    #[instrument(skip(self), fields(folder = %self.label))]
    pub fn start_watching(&mut self) -> Result<bool> {
        let index_dir = self.config.is_indexed().then(|| self.config.index_dir());
        if !self
            .watch
            .start(self.config.dir(), index_dir, self.sender.clone())?
        {
            return Ok(false);
        }

        info!(dir = %display_path(self.config.dir()), "Watch started");
        self.emit_folder(FolderEvent::WatchStarted {
            folder: self.label.clone(),
        });

        self.first_folder_load = true;
        self.update();
        Ok(true)
    }

    /// Detaches filesystem notifications. Returns `false` if none were
    /// attached.
    pub fn stop_watching(&mut self) -> bool {
        if !self.watch.stop() {
            return false;
        }
        info!(folder = %self.label, "Watch stopped");
        self.emit_folder(FolderEvent::WatchStopped {
            folder: self.label.clone(),
        });
        true
    }

    // ------------------------------------------------------------------
    // Install / uninstall
    // ------------------------------------------------------------------

    /// Copies an external file or folder into the managed folder and
    /// requests an update. Returns the installed path.
    ///
    /// A file replaces any existing file of the same name and removes its
    /// opposite enabled/disabled variant. A folder is never merged into an
    /// existing destination.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidSource`] if `source` is missing or has no file name
    /// - [`SyncError::SameLocation`] if `source` already is the destination
    /// - [`SyncError::AlreadyExists`] if a folder (or a file over a folder)
    ///   would overwrite an existing destination
    #[instrument(skip(self), fields(folder = %self.label))]
    pub async fn install_resource(&mut self, source: &Path) -> Result<PathBuf> {
        let stat = fs::metadata(source).map_err(|e| SyncError::InvalidSource {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
        let file_name = source.file_name().ok_or_else(|| SyncError::InvalidSource {
            path: source.to_path_buf(),
            reason: "path has no file name".to_string(),
        })?;
        let dest = self.config.dir().join(file_name);

        if let Ok(dest_stat) = fs::symlink_metadata(&dest) {
            if is_same_file(source, &dest) {
                return Err(SyncError::SameLocation(dest));
            }
            if stat.is_dir() || dest_stat.is_dir() {
                return Err(SyncError::AlreadyExists(dest));
            }
        }

        let copy_source = source.to_path_buf();
        let copy_dest = dest.clone();
        if stat.is_dir() {
            self.pool
                .run(move || copy_dir(&copy_source, &copy_dest))
                .await?
                .map_err(|e| SyncError::io(&dest, e))?;
        } else {
            let sibling = self
                .config
                .dir()
                .join(opposite_file_name(&file_name.to_string_lossy()));
            remove_if_present(&sibling)?;
            remove_if_present(&dest)?;

            self.pool
                .run(move || copy_file(&copy_source, &copy_dest))
                .await?
                .map_err(|e| SyncError::io(&dest, e))?;
        }

        info!(source = %display_path(source), dest = %display_path(&dest), "Installed resource");
        self.update();
        Ok(dest)
    }

    /// Installs `source` and writes its side-car record.
    ///
    /// The record's `filename` is set to the installed (enabled) file name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MetadataRecord`] without copying anything if the
    /// folder is not indexed.
    pub async fn install_resource_with_metadata(
        &mut self,
        source: &Path,
        mut record: MetadataRecord,
    ) -> Result<PathBuf> {
        if !self.config.is_indexed() {
            return Err(SyncError::MetadataRecord(format!(
                "folder {} does not keep metadata records",
                self.label
            )));
        }

        let dest = self.install_resource(source).await?;
        if let Some(name) = dest.file_name() {
            let name = name.to_string_lossy();
            record.filename = enabled_file_name(&name).unwrap_or(&name).to_string();
        }
        MetadataIndex::new(self.config.index_dir()).write(&record)?;

        self.update();
        Ok(dest)
    }

    /// Deletes the resource whose backing file is named `file_name`, and its
    /// metadata record unless `preserve_metadata` is set, then requests an
    /// update.
    #[instrument(skip(self), fields(folder = %self.label))]
    pub fn uninstall_resource(&mut self, file_name: &str, preserve_metadata: bool) -> Result<()> {
        let row = self
            .index
            .iter()
            .position(|resource| resource.file_name() == file_name)
            .ok_or_else(|| SyncError::NotFound(file_name.to_string()))?;

        self.destroy_row(row, preserve_metadata)?;
        info!(resource_id = %file_name, preserve_metadata, "Uninstalled resource");
        self.update();
        Ok(())
    }

    fn destroy_row(&mut self, row: usize, preserve_metadata: bool) -> Result<()> {
        let ticket = self.index.at(row).and_then(Resource::ticket);
        self.cancel_ticket(ticket);
        self.index.update_row(row, Resource::set_unresolved);

        match self.index.at(row) {
            Some(resource) => resource.destroy(self.config.index_dir(), preserve_metadata),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Batch operations
    // ------------------------------------------------------------------

    /// Enables, disables or toggles the given resources by renaming them.
    ///
    /// Renamed rows keep their position; only their lookup entry moves. An
    /// in-flight parse follows the resource to its new id.
    #[instrument(skip(self, ids), fields(folder = %self.label, count = ids.len()))]
    pub fn set_enabled<S: AsRef<str>>(&mut self, ids: &[S], action: EnableAction) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for id in ids {
            let id = id.as_ref();
            match self.enable_one(id, action) {
                Ok(()) => outcome.succeeded.push(id.to_string()),
                Err(err) => {
                    warn!(resource_id = %id, error = %err, "Failed to change enabled state");
                    outcome.failed.push((id.to_string(), err));
                }
            }
        }
        outcome
    }

    fn enable_one(&mut self, id: &str, action: EnableAction) -> Result<()> {
        let row = self
            .index
            .row_of(id)
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;

        let other = opposite_file_name(id);
        if self.index.contains(&other) {
            return Err(SyncError::AlreadyExists(self.config.dir().join(other)));
        }

        let renamed = self
            .index
            .update_row(row, |resource| resource.enable(action))
            .ok_or_else(|| SyncError::NotFound(id.to_string()))??;
        if !renamed {
            return Ok(());
        }
        // A snapshot taken before the rename would bring the old name back
        if self.in_flight.is_some() {
            self.rescan_requested = true;
        }

        if let Some(resource) = self.index.at(row) {
            if let Some(ticket) = resource.ticket() {
                self.scheduler.rebind(ticket, resource.id());
            }
            debug!(from = %id, to = %resource.id(), "Renamed resource");
        }
        self.emit_folder(FolderEvent::RowsChanged {
            folder: self.label.clone(),
            first: row,
            last: row,
        });
        Ok(())
    }

    /// Deletes the given resources and their metadata records, then requests
    /// one update.
    #[instrument(skip(self, ids), fields(folder = %self.label, count = ids.len()))]
    pub fn delete_resources<S: AsRef<str>>(&mut self, ids: &[S]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for id in ids {
            let id = id.as_ref();
            let result = match self.index.row_of(id) {
                Some(row) => self.destroy_row(row, false),
                None => Err(SyncError::NotFound(id.to_string())),
            };
            match result {
                Ok(()) => outcome.succeeded.push(id.to_string()),
                Err(err) => {
                    warn!(resource_id = %id, error = %err, "Failed to delete resource");
                    outcome.failed.push((id.to_string(), err));
                }
            }
        }

        if outcome.any_succeeded() {
            info!(deleted = outcome.succeeded.len(), "Deleted resources");
            self.update();
        }
        outcome
    }

    /// Removes the metadata records of the given resources, leaving their
    /// files alone, then requests one update.
    #[instrument(skip(self, ids), fields(folder = %self.label, count = ids.len()))]
    pub fn delete_metadata<S: AsRef<str>>(&mut self, ids: &[S]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let records = MetadataIndex::new(self.config.index_dir());

        for id in ids {
            let id = id.as_ref();
            let result = match self.index.find(id).map(Resource::metadata) {
                Some(Some(record)) => records.remove(record).map(|_| ()),
                Some(None) => Err(SyncError::MetadataRecord(format!("{} has no metadata record", id))),
                None => Err(SyncError::NotFound(id.to_string())),
            };
            match result {
                Ok(()) => outcome.succeeded.push(id.to_string()),
                Err(err) => {
                    warn!(resource_id = %id, error = %err, "Failed to delete metadata record");
                    outcome.failed.push((id.to_string(), err));
                }
            }
        }

        if outcome.any_succeeded() {
            self.update();
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn index(&self) -> &ResourceIndex {
        &self.index
    }

    pub fn config(&self) -> &FolderConfig {
        &self.config
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn stats(&self) -> ModelStats {
        self.stats
    }

    pub fn has_pending_parse_tasks(&self) -> bool {
        self.scheduler.has_pending()
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_watching()
    }

    /// Whether a scan is running or queued.
    pub fn is_updating(&self) -> bool {
        self.in_flight.is_some() || self.rescan_requested
    }

    /// Row numbers in display order.
    pub fn sorted_rows(&self, key: SortKey, ascending: bool) -> Vec<usize> {
        let mut rows: Vec<usize> = (0..self.index.size()).collect();
        rows.sort_by(|a, b| match (self.index.at(*a), self.index.at(*b)) {
            (Some(a), Some(b)) => {
                let ord = a.compare(b, key);
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            }
            _ => a.cmp(b),
        });
        rows
    }

    /// Row numbers of resources matching `query`, in index order.
    pub fn filter_rows(&self, query: &str) -> Vec<usize> {
        self.index
            .iter()
            .enumerate()
            .filter(|(_, resource)| resource.matches_filter(query))
            .map(|(row, _)| row)
            .collect()
    }

    fn emit_folder(&self, event: FolderEvent) {
        self.emit(CoreEvent::Folder(event));
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine
        let _ = self.events.emit(event);
    }
}

impl Drop for ResourceFolderModel {
    fn drop(&mut self) {
        if let Some(scan) = self.in_flight.take() {
            scan.cancel.cancel();
        }
        let cancelled = self.scheduler.cancel_all();
        self.watch.stop();
        if cancelled > 0 {
            debug!(folder = %self.label, cancelled, "Cancelled parse tasks on drop");
        }
    }
}

impl std::fmt::Debug for ResourceFolderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceFolderModel")
            .field("config", &self.config)
            .field("rows", &self.index.size())
            .field("scheduler", &self.scheduler)
            .field("watch", &self.watch)
            .field("updating", &self.is_updating())
            .finish()
    }
}

/// Forwards reconciler cancellations to the scheduler and remembers them for
/// event emission.
struct EventingCanceller<'a> {
    scheduler: &'a mut ResolutionScheduler,
    cancelled: Vec<(Ticket, String)>,
}

impl TicketCanceller for EventingCanceller<'_> {
    fn cancel(&mut self, ticket: Ticket) -> bool {
        match self.scheduler.cancel(ticket) {
            Some(resource_id) => {
                self.cancelled.push((ticket, resource_id));
                true
            }
            None => false,
        }
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(stat) if stat.is_dir() => Err(SyncError::AlreadyExists(path.to_path_buf())),
        Ok(_) => fs::remove_file(path).map_err(|e| SyncError::io(path, e)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SyncError::io(path, err)),
    }
}

/// Copies a file and stamps it with the current time so the next scan sees
/// it as changed even when the source was older.
fn copy_file(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest)?;
    fs::File::options()
        .write(true)
        .open(dest)?
        .set_modified(SystemTime::now())
}

fn copy_dir(source: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_folder_config_defaults() {
        let config = FolderConfig::new("/instances/a/mods", FolderKind::Mods);
        assert_eq!(config.index_dir(), Path::new("/instances/a/mods/.index"));
        assert!(!config.is_indexed());
        assert!(config.create_dir());
        assert_eq!(config.label(), "mods");

        let config = config
            .with_indexed(true)
            .with_index_dir("/elsewhere")
            .with_create_dir(false);
        assert!(config.is_indexed());
        assert_eq!(config.index_dir(), Path::new("/elsewhere"));
        assert!(!config.create_dir());
    }

    #[test]
    fn test_label_falls_back_to_kind() {
        assert_eq!(FolderConfig::new("/", FolderKind::ResourcePacks).label(), "resourcepacks");
    }

    #[test]
    fn test_copy_dir_is_recursive() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("World");
        fs::create_dir_all(source.join("region")).unwrap();
        fs::write(source.join("level.dat"), "nbt").unwrap();
        fs::write(source.join("region").join("r.0.0.mca"), "mca").unwrap();

        let dest = dir.path().join("copy");
        copy_dir(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("region").join("r.0.0.mca")).unwrap(), "mca");
    }

    #[test]
    fn test_remove_if_present() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.jar");
        fs::write(&file, "x").unwrap();

        remove_if_present(&file).unwrap();
        assert!(!file.exists());
        remove_if_present(&file).unwrap();
        assert!(matches!(
            remove_if_present(dir.path()),
            Err(SyncError::AlreadyExists(_))
        ));
    }
}
