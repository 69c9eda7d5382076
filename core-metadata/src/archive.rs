//! Bounded reads from archives and directories.
//!
//! Resource files are untrusted. Every manifest read is capped at
//! [`MAX_MANIFEST_BYTES`] so a hostile archive cannot balloon memory.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{MetadataError, Result};

/// Largest manifest the parsers will read.
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// A resource's contents, either unpacked on disk or inside a zip.
pub(crate) enum Source {
    Directory(PathBuf),
    Zip(ZipArchive<File>),
}

impl Source {
    pub(crate) fn directory(path: &Path) -> Self {
        Self::Directory(path.to_path_buf())
    }

    pub(crate) fn open_zip(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::Zip(ZipArchive::new(file)?))
    }

    /// Reads `name` (a `/`-separated relative path), or `None` when absent.
    pub(crate) fn read(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Directory(root) => {
                let path = root.join(name);
                if !path.is_file() {
                    return Ok(None);
                }
                let file = File::open(&path)?;
                read_capped(file, name).map(Some)
            }
            Self::Zip(archive) => match archive.by_name(name) {
                Ok(entry) => read_capped(entry, name).map(Some),
                Err(ZipError::FileNotFound) => Ok(None),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Like [`read`](Self::read) but decoded as UTF-8.
    pub(crate) fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        match self.read(name)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| MetadataError::InvalidMetadata(format!("{} is not valid UTF-8", name))),
            None => Ok(None),
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        match self {
            Self::Directory(root) => root.join(name).exists(),
            Self::Zip(archive) => archive.index_for_name(name).is_some(),
        }
    }

    /// True when any entry lives under the directory `prefix`.
    pub(crate) fn has_directory(&self, prefix: &str) -> bool {
        match self {
            Self::Directory(root) => root.join(prefix).is_dir(),
            Self::Zip(archive) => {
                let dir = format!("{}/", prefix.trim_end_matches('/'));
                archive.file_names().any(|entry| entry.starts_with(&dir))
            }
        }
    }

    /// Names of the top-level directories.
    pub(crate) fn top_level_dirs(&self) -> Result<Vec<String>> {
        match self {
            Self::Directory(root) => {
                let mut dirs = Vec::new();
                for entry in fs::read_dir(root)? {
                    let entry = entry?;
                    if entry.file_type()?.is_dir() {
                        dirs.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                dirs.sort();
                Ok(dirs)
            }
            Self::Zip(archive) => {
                let mut dirs: Vec<String> = archive
                    .file_names()
                    .filter_map(|entry| entry.split_once('/').map(|(head, _)| head))
                    .filter(|head| !head.is_empty())
                    .map(str::to_string)
                    .collect();
                dirs.sort();
                dirs.dedup();
                Ok(dirs)
            }
        }
    }
}

fn read_capped(reader: impl Read, name: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(MAX_MANIFEST_BYTES + 1).read_to_end(&mut buf)?;
    if buf.len() as u64 > MAX_MANIFEST_BYTES {
        return Err(MetadataError::InvalidMetadata(format!(
            "{} exceeds {} bytes",
            name, MAX_MANIFEST_BYTES
        )));
    }
    Ok(buf)
}
