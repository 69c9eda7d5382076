//! # Side-car Metadata Index
//!
//! Provenance records for installed resources, one JSON file per resource in
//! an index directory next to (usually inside) the managed folder.
//!
//! ## Layout
//!
//! ```text
//! mods/
//!   jei.jar
//!   sodium.jar.disabled
//!   .index/
//!     jei.json        <- keyed by slug
//!     sodium.json
//! ```
//!
//! A record is keyed by its provider slug, or by the resource file name when
//! the provider has none. `filename` always holds the enabled file name; the
//! scanner maps disabled variants back onto it.
//!
//! Records are written by the download collaborator once a file has been
//! fetched and removed when the resource is uninstalled. The scanner only reads
//! them.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use core_runtime::logging::display_path;

use crate::error::{Result, SyncError};

const RECORD_EXTENSION: &str = "json";

/// Provenance of one installed resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Display name reported by the provider.
    pub name: String,
    /// Enabled file name of the resource in the managed folder.
    pub filename: String,
    /// Provider that produced the file (e.g. `modrinth`, `curseforge`).
    pub provider: String,
    pub project_id: String,
    pub version_id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// `client`, `server` or `both`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
}

impl MetadataRecord {
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        provider: impl Into<String>,
        project_id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            provider: provider.into(),
            project_id: project_id.into(),
            version_id: version_id.into(),
            slug: String::new(),
            download_url: None,
            hash: None,
            side: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Key the record file is stored under.
    pub fn key(&self) -> String {
        let key = if self.slug.trim().is_empty() {
            self.filename.as_str()
        } else {
            self.slug.as_str()
        };
        key.chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c => c,
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(SyncError::MetadataRecord(format!(
                "record '{}' has no filename",
                self.name
            )));
        }
        let mut components = Path::new(&self.filename).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain {
            return Err(SyncError::MetadataRecord(format!(
                "record filename '{}' must be a plain file name",
                self.filename
            )));
        }
        Ok(())
    }
}

/// Directory of [`MetadataRecord`] files.
#[derive(Debug, Clone)]
pub struct MetadataIndex {
    dir: PathBuf,
}

impl MetadataIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, record: &MetadataRecord) -> PathBuf {
        self.dir
            .join(format!("{}.{}", record.key(), RECORD_EXTENSION))
    }

    /// Loads every record in the index.
    ///
    /// A missing index directory is an empty index. Unreadable or malformed
    /// records are skipped with a warning so one bad file cannot hide the
    /// rest of the folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be listed.
    pub fn read_all(&self) -> Result<Vec<MetadataRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(SyncError::io(&self.dir, err)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SyncError::io(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }

            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %display_path(&path), error = %err, "Skipping unreadable metadata record"),
            }
        }

        // read_dir order is platform dependent
        records.sort_by(|a, b| a.filename.cmp(&b.filename).then_with(|| a.key().cmp(&b.key())));
        Ok(records)
    }

    /// Record whose `filename` is `filename`.
    pub fn find_by_filename(&self, filename: &str) -> Result<Option<MetadataRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|record| record.filename == filename))
    }

    /// Record for a provider project.
    pub fn find_by_project(&self, provider: &str, project_id: &str) -> Result<Option<MetadataRecord>> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|record| record.provider == provider && record.project_id == project_id))
    }

    /// Writes (or replaces) a record, creating the index directory if needed.
    ///
    /// The file is written beside its final name and renamed into place so a
    /// concurrent scan never reads half a record.
    pub fn write(&self, record: &MetadataRecord) -> Result<PathBuf> {
        record.validate()?;
        fs::create_dir_all(&self.dir).map_err(|e| SyncError::io(&self.dir, e))?;

        let path = self.record_path(record);
        let staging = self.dir.join(format!(".{}.tmp", record.key()));
        let contents = serde_json::to_vec_pretty(record)
            .map_err(|e| SyncError::MetadataRecord(e.to_string()))?;

        fs::write(&staging, contents).map_err(|e| SyncError::io(&staging, e))?;
        fs::rename(&staging, &path).map_err(|source| SyncError::Rename {
            from: staging.clone(),
            to: path.clone(),
            source,
        })?;

        debug!(path = %display_path(&path), "Wrote metadata record");
        Ok(path)
    }

    /// Deletes a record. Returns `false` if it did not exist.
    pub fn remove(&self, record: &MetadataRecord) -> Result<bool> {
        let path = self.record_path(record);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %display_path(&path), "Removed metadata record");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(SyncError::io(path, err)),
        }
    }
}

fn read_record(path: &Path) -> Result<MetadataRecord> {
    let contents = fs::read(path).map_err(|e| SyncError::io(path, e))?;
    let record: MetadataRecord =
        serde_json::from_slice(&contents).map_err(|e| SyncError::MetadataRecord(e.to_string()))?;
    record.validate()?;
    Ok(record)
}
