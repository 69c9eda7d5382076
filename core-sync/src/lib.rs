//! # Resource Folder Sync Module
//!
//! Keeps an in-memory index of a managed folder (mods, resource packs, data
//! packs, shader packs, world saves) in step with the filesystem.
//!
//! ## Overview
//!
//! This module manages the lifecycle of folder resources, including:
//! - Scanning the folder and its side-car metadata index into a snapshot
//! - Reconciling snapshots into a stable, ordered index
//! - Parsing resource details in the background under cancellable tickets
//! - Reacting to filesystem notifications
//! - Installing, uninstalling and enabling/disabling resources
//!
//! ## Components
//!
//! - **Resource** (`resource`): one file or folder plus its record and details
//! - **Metadata** (`metadata`): side-car provenance records
//! - **Scanner** (`scanner`): directory + index → [`Snapshot`]
//! - **Reconciler** (`reconciler`): snapshot → index diff
//! - **Index** (`index`): ordered rows with id lookup
//! - **Scheduler** (`scheduler`): ticketed background parses
//! - **Watch** (`watch`): filesystem notification plumbing
//! - **Model** (`model`): [`ResourceFolderModel`], the single writer

pub mod error;
pub mod index;
pub mod message;
pub mod metadata;
pub mod model;
pub mod reconciler;
pub mod resource;
pub mod scanner;
pub mod scheduler;
pub mod watch;

pub use error::{Result, SyncError};
pub use index::ResourceIndex;
pub use message::{ModelMessage, ParseOutcome};
pub use metadata::{MetadataIndex, MetadataRecord};
pub use model::{
    BatchOutcome, FolderConfig, ModelStats, ResourceFolderModel, ResourceFolderModelBuilder,
    DEFAULT_INDEX_DIR,
};
pub use reconciler::{IndexChange, ReconcileOutcome, TicketCanceller};
pub use resource::{
    disabled_file_name, enabled_file_name, EnableAction, Resource, ResolutionState,
    ResourceStatus, SortKey, DISABLED_SUFFIX,
};
pub use scanner::{scan, ScanRequest, Snapshot};
pub use scheduler::{ResolutionScheduler, Ticket};
pub use watch::WatchController;
