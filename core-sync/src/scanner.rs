//! # Snapshot Scanner
//!
//! Reads the managed directory and (optionally) the side-car index and
//! produces a candidate [`Snapshot`]. The scanner never touches the live
//! index; reconciliation is a separate step.
//!
//! ## Merge rules
//!
//! 1. Each metadata record becomes a `NotInstalled` placeholder keyed by its
//!    file name.
//! 2. Enabled entries claim a matching placeholder (`Installed`) or are added
//!    as `NoMetadata`.
//! 3. Disabled entries claim the placeholder of their enabled name. The
//!    placeholder is dropped so both variants never appear as separate rows.
//! 4. With `clean_orphans`, records of placeholders left unclaimed are
//!    deleted when nothing exists at their path. Only the side-car record is
//!    removed; cleanup never deletes from the managed directory.
//!
//! When several records name the same file, the first one (by key) wins and
//! the others are reported.
//!
//! Hidden entries (leading `.`) are skipped, which keeps the default
//! `.index` directory out of the snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use core_async::sync::CancellationToken;

use crate::error::{Result, SyncError};
use crate::metadata::MetadataIndex;
use crate::resource::{enabled_file_name, Resource, ResourceStatus};

/// Point-in-time view of a managed folder, keyed by resource id.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub resources: BTreeMap<String, Resource>,
    /// Orphaned metadata records deleted during the scan.
    pub orphans_cleaned: usize,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.resources.get(id)
    }
}

/// Parameters of one scan. Cloned into the worker that runs it.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub dir: PathBuf,
    pub index_dir: PathBuf,
    pub is_indexed: bool,
    pub clean_orphans: bool,
}

impl ScanRequest {
    /// Runs the scan on the current thread.
    ///
    /// `cancel` is checked between phases; a cancelled scan returns
    /// [`SyncError::Cancelled`] and deletes nothing.
    ///
    /// # Errors
    ///
    /// - [`SyncError::DirectoryUnavailable`] if `dir` cannot be listed
    /// - [`SyncError::Io`] if the index directory exists but cannot be listed
    #[instrument(skip(self, cancel), fields(dir = %self.dir.display(), clean_orphans = self.clean_orphans))]
    pub fn run(&self, cancel: &CancellationToken) -> Result<Snapshot> {
        let mut resources = BTreeMap::new();

        if self.is_indexed {
            for record in MetadataIndex::new(&self.index_dir).read_all()? {
                let placeholder = Resource::placeholder(record, &self.dir);
                if let Some(kept) = resources.get(placeholder.id()) {
                    warn!(
                        resource_id = %placeholder.id(),
                        kept = %record_key(kept),
                        ignored = %record_key(&placeholder),
                        "Several metadata records share one filename"
                    );
                    continue;
                }
                resources.insert(placeholder.id().to_string(), placeholder);
            }
        }
        ensure_live(cancel)?;

        let (enabled, disabled) = self.list_entries()?;
        ensure_live(cancel)?;

        for path in enabled {
            let Some(mut resource) = read_resource(&path) else {
                continue;
            };
            match resources.remove(resource.id()) {
                Some(mut placeholder) if placeholder.status() == ResourceStatus::NotInstalled => {
                    resource.set_metadata(placeholder.take_metadata());
                    resource.set_status(ResourceStatus::Installed);
                }
                _ => resource.set_status(ResourceStatus::NoMetadata),
            }
            resources.insert(resource.id().to_string(), resource);
        }

        for path in disabled {
            let Some(mut resource) = read_resource(&path) else {
                continue;
            };
            let claimed = enabled_file_name(resource.id()).and_then(|name| {
                let is_placeholder = resources
                    .get(name)
                    .is_some_and(|r| r.status() == ResourceStatus::NotInstalled);
                is_placeholder.then(|| resources.remove(name)).flatten()
            });
            match claimed {
                Some(mut placeholder) => {
                    resource.set_metadata(placeholder.take_metadata());
                    resource.set_status(ResourceStatus::Installed);
                }
                None => resource.set_status(ResourceStatus::NoMetadata),
            }
            resources.insert(resource.id().to_string(), resource);
        }
        ensure_live(cancel)?;

        let mut orphans_cleaned = 0;
        if self.clean_orphans {
            let index = MetadataIndex::new(&self.index_dir);
            let orphans: Vec<String> = resources
                .values()
                .filter(|r| r.status() == ResourceStatus::NotInstalled)
                .map(|r| r.id().to_string())
                .collect();

            for id in orphans {
                let Some(orphan) = resources.get(&id) else {
                    continue;
                };
                // Hidden or otherwise unlisted files still back their record
                if fs::symlink_metadata(orphan.path()).is_ok() {
                    continue;
                }
                let Some(record) = orphan.metadata() else {
                    continue;
                };
                match index.remove(record) {
                    Ok(_) => {
                        debug!(resource_id = %id, "Deleted orphaned metadata record");
                        resources.remove(&id);
                        orphans_cleaned += 1;
                    }
                    Err(err) => {
                        warn!(resource_id = %id, error = %err, "Failed to delete orphaned metadata record")
                    }
                }
            }
        }

        debug!(resources = resources.len(), orphans_cleaned, "Scan complete");
        Ok(Snapshot {
            resources,
            orphans_cleaned,
        })
    }

    /// Visible entries of `dir`, split into enabled and disabled names and
    /// sorted so scans are deterministic.
    fn list_entries(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let entries = fs::read_dir(&self.dir).map_err(|source| SyncError::DirectoryUnavailable {
            path: self.dir.clone(),
            source,
        })?;

        let mut enabled = Vec::new();
        let mut disabled = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SyncError::DirectoryUnavailable {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if name.starts_with('.') || path == self.index_dir {
                continue;
            }
            if enabled_file_name(&name).is_some() {
                disabled.push(path);
            } else {
                enabled.push(path);
            }
        }

        enabled.sort();
        disabled.sort();
        Ok((enabled, disabled))
    }
}

/// Scans `dir` on the current thread with a token that is never cancelled.
pub fn scan(dir: &Path, index_dir: &Path, is_indexed: bool, clean_orphans: bool) -> Result<Snapshot> {
    ScanRequest {
        dir: dir.to_path_buf(),
        index_dir: index_dir.to_path_buf(),
        is_indexed,
        clean_orphans,
    }
    .run(&CancellationToken::new())
}

fn record_key(resource: &Resource) -> String {
    resource.metadata().map(|record| record.key()).unwrap_or_default()
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

/// Entries can vanish between listing and stat; those are skipped.
fn read_resource(path: &Path) -> Option<Resource> {
    match Resource::from_path(path) {
        Ok(resource) => Some(resource),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
            None
        }
    }
}
