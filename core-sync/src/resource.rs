//! # Resource
//!
//! One managed item backed by a file or folder in the watched directory, plus
//! its optional side-car record and parsed details.
//!
//! ## Identity
//!
//! A resource's id is its current file name, including the `.disabled` suffix
//! when it is disabled. Toggling a resource renames it on disk, so the id
//! changes with it; owners must re-index under the new id (see
//! [`ResourceIndex::update_row`](crate::index::ResourceIndex::update_row)).
//!
//! The enabled/disabled mapping is [`enabled_file_name`] and
//! [`disabled_file_name`]; nothing else in the crate manipulates the suffix.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use core_metadata::{compare_versions, ResourceDetails, ResourceKind};

use crate::error::{Result, SyncError};
use crate::metadata::{MetadataIndex, MetadataRecord};
use crate::scheduler::Ticket;

/// Suffix marking a disabled resource.
pub const DISABLED_SUFFIX: &str = ".disabled";

/// Enabled form of a disabled file name, or `None` if `name` is not disabled.
///
/// ```
/// use core_sync::resource::enabled_file_name;
///
/// assert_eq!(enabled_file_name("jei.jar.disabled"), Some("jei.jar"));
/// assert_eq!(enabled_file_name("jei.jar"), None);
/// ```
pub fn enabled_file_name(name: &str) -> Option<&str> {
    name.strip_suffix(DISABLED_SUFFIX)
        .filter(|stem| !stem.is_empty())
}

/// Disabled form of an enabled file name.
pub fn disabled_file_name(name: &str) -> String {
    format!("{}{}", name, DISABLED_SUFFIX)
}

/// The other enabled/disabled variant of `name`.
pub fn opposite_file_name(name: &str) -> String {
    match enabled_file_name(name) {
        Some(enabled) => enabled.to_string(),
        None => disabled_file_name(name),
    }
}

/// Relationship between a resource's file and its side-car record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    /// File and metadata record both exist.
    Installed,
    /// Metadata record without a backing file.
    NotInstalled,
    /// File without a metadata record.
    NoMetadata,
    /// Not yet classified by a scan.
    Unknown,
}

/// Background parse state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolving(Ticket),
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableAction {
    Enable,
    Disable,
    Toggle,
}

/// Column a resource list can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    Date,
    Version,
    Enabled,
    Provider,
    Size,
}

/// Tie-breakers applied after the primary key, in order.
const FALLBACK_KEYS: [SortKey; 4] = [SortKey::Enabled, SortKey::Name, SortKey::Date, SortKey::Size];

#[derive(Debug, Clone)]
pub struct Resource {
    id: String,
    path: PathBuf,
    kind: ResourceKind,
    enabled: bool,
    last_modified: Option<DateTime<Utc>>,
    size_bytes: u64,
    status: ResourceStatus,
    metadata: Option<MetadataRecord>,
    resolution: ResolutionState,
    details: Option<ResourceDetails>,
}

impl Resource {
    /// Reads a resource from disk.
    ///
    /// Folder sizes are summed recursively; unreadable children are skipped.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| SyncError::NotFound(path.display().to_string()))?;
        let stat = fs::metadata(&path).map_err(|e| SyncError::io(&path, e))?;

        let enabled_name = enabled_file_name(&file_name);
        let kind = ResourceKind::classify(enabled_name.unwrap_or(&file_name), stat.is_dir());
        let size_bytes = if stat.is_dir() {
            folder_size(&path)
        } else {
            stat.len()
        };

        Ok(Self {
            enabled: enabled_name.is_none(),
            id: file_name,
            kind,
            last_modified: stat.modified().ok().map(DateTime::<Utc>::from),
            size_bytes,
            status: ResourceStatus::Unknown,
            metadata: None,
            resolution: ResolutionState::Unresolved,
            details: None,
            path,
        })
    }

    /// Stand-in for a metadata record whose file is missing from `dir`.
    pub fn placeholder(record: MetadataRecord, dir: &Path) -> Self {
        let enabled_name = enabled_file_name(&record.filename);
        Self {
            id: record.filename.clone(),
            path: dir.join(&record.filename),
            kind: ResourceKind::classify(enabled_name.unwrap_or(&record.filename), false),
            enabled: enabled_name.is_none(),
            last_modified: None,
            size_bytes: 0,
            status: ResourceStatus::NotInstalled,
            metadata: Some(record),
            resolution: ResolutionState::Unresolved,
            details: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name on disk. Same as the id.
    pub fn file_name(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    pub fn metadata(&self) -> Option<&MetadataRecord> {
        self.metadata.as_ref()
    }

    pub fn resolution(&self) -> ResolutionState {
        self.resolution
    }

    pub fn details(&self) -> Option<&ResourceDetails> {
        self.details.as_ref()
    }

    /// Parsed name, then the provider's name, then the enabled file name.
    pub fn name(&self) -> &str {
        self.details
            .as_ref()
            .and_then(|details| details.name.as_deref())
            .or_else(|| self.metadata.as_ref().map(|record| record.name.as_str()))
            .unwrap_or_else(|| enabled_file_name(&self.id).unwrap_or(&self.id))
    }

    pub fn version(&self) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|details| details.version.as_deref())
    }

    pub fn provider(&self) -> Option<&str> {
        self.metadata.as_ref().map(|record| record.provider.as_str())
    }

    pub fn ticket(&self) -> Option<Ticket> {
        match self.resolution {
            ResolutionState::Resolving(ticket) => Some(ticket),
            _ => None,
        }
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self.resolution, ResolutionState::Resolving(_))
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution == ResolutionState::Resolved
    }

    /// Whether a parse task should be started for this resource.
    ///
    /// Placeholders have no file to parse.
    pub fn should_resolve(&self) -> bool {
        self.resolution == ResolutionState::Unresolved && self.status != ResourceStatus::NotInstalled
    }

    pub(crate) fn set_status(&mut self, status: ResourceStatus) {
        self.status = status;
    }

    pub(crate) fn set_metadata(&mut self, metadata: Option<MetadataRecord>) {
        self.metadata = metadata;
    }

    pub(crate) fn take_metadata(&mut self) -> Option<MetadataRecord> {
        self.metadata.take()
    }

    pub(crate) fn set_resolving(&mut self, ticket: Ticket) {
        self.resolution = ResolutionState::Resolving(ticket);
    }

    pub(crate) fn set_resolved(&mut self, details: ResourceDetails) {
        self.details = Some(details);
        self.resolution = ResolutionState::Resolved;
    }

    pub(crate) fn set_unresolved(&mut self) {
        self.resolution = ResolutionState::Unresolved;
    }

    /// Renames the backing file to match `action`.
    ///
    /// Returns `Ok(false)` when the resource is already in the requested
    /// state. On success the id and path change; the ticket, details and
    /// metadata stay with the resource.
    ///
    /// # Errors
    ///
    /// - [`SyncError::AlreadyExists`] if the other variant is already on disk
    /// - [`SyncError::Rename`] if the filesystem refuses the rename
    pub fn enable(&mut self, action: EnableAction) -> Result<bool> {
        let target = match action {
            EnableAction::Enable => true,
            EnableAction::Disable => false,
            EnableAction::Toggle => !self.enabled,
        };
        if target == self.enabled {
            return Ok(false);
        }

        let new_name = if target {
            enabled_file_name(&self.id)
                .map(str::to_string)
                .ok_or_else(|| SyncError::NotFound(self.id.clone()))?
        } else {
            disabled_file_name(&self.id)
        };
        let new_path = self.path.with_file_name(&new_name);

        if fs::symlink_metadata(&new_path).is_ok() {
            return Err(SyncError::AlreadyExists(new_path));
        }

        fs::rename(&self.path, &new_path).map_err(|source| SyncError::Rename {
            from: self.path.clone(),
            to: new_path.clone(),
            source,
        })?;

        self.id = new_name;
        self.path = new_path;
        self.enabled = target;
        Ok(true)
    }

    /// Deletes the backing file or folder, and the side-car record unless
    /// `preserve_metadata` is set.
    ///
    /// Anything already gone counts as deleted.
    pub fn destroy(&self, index_dir: &Path, preserve_metadata: bool) -> Result<()> {
        let removed = match fs::symlink_metadata(&self.path) {
            Ok(stat) if stat.is_dir() => fs::remove_dir_all(&self.path),
            Ok(_) => fs::remove_file(&self.path),
            Err(err) => Err(err),
        };
        match removed {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(SyncError::io(&self.path, err)),
        }

        if !preserve_metadata {
            if let Some(record) = &self.metadata {
                MetadataIndex::new(index_dir).remove(record)?;
            }
        }
        Ok(())
    }

    /// Three-way comparison for sorting, ascending.
    ///
    /// Ties on `key` fall through enabled, name, date and size, then the id,
    /// so the order is total.
    pub fn compare(&self, other: &Resource, key: SortKey) -> Ordering {
        let primary = self.compare_by(other, key);
        if primary != Ordering::Equal {
            return primary;
        }

        FALLBACK_KEYS
            .iter()
            .filter(|fallback| **fallback != key)
            .map(|fallback| self.compare_by(other, *fallback))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or_else(|| self.id.cmp(&other.id))
    }

    fn compare_by(&self, other: &Resource, key: SortKey) -> Ordering {
        match key {
            // Enabled resources first
            SortKey::Enabled => other.enabled.cmp(&self.enabled),
            SortKey::Name => sort_name(self.name()).cmp(&sort_name(other.name())),
            SortKey::Date => self.last_modified.cmp(&other.last_modified),
            SortKey::Size => self.size_bytes.cmp(&other.size_bytes),
            SortKey::Version => match (self.version(), other.version()) {
                (Some(a), Some(b)) => compare_versions(a, b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            },
            SortKey::Provider => self.provider().cmp(&other.provider()),
        }
    }

    /// Case-insensitive match on name, file name, mod id and provider.
    pub fn matches_filter(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        let mod_id = self.details.as_ref().and_then(|d| d.mod_id.as_deref());
        [Some(self.name()), Some(self.id.as_str()), mod_id, self.provider()]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Name with punctuation dropped and case folded, so `[JEI] Items` and
/// `jei items` sort together.
fn sort_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn folder_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.metadata().ok())
        .filter(|stat| stat.is_file())
        .map(|stat| stat.len())
        .sum()
}
