use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Directory {} is unavailable: {source}", path.display())]
    DirectoryUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Resource {0} not found")]
    NotFound(String),

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} is already in the managed folder", .0.display())]
    SameLocation(PathBuf),

    #[error("Cannot install {}: {reason}", path.display())]
    InvalidSource { path: PathBuf, reason: String },

    #[error("Failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Metadata record error: {0}")]
    MetadataRecord(String),

    #[error("Watch error: {0}")]
    Watch(#[from] bridge_traits::BridgeError),

    #[error("Worker pool error: {0}")]
    Runtime(#[from] core_async::PoolError),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] core_metadata::MetadataError),

    #[error("Scan cancelled")]
    Cancelled,
}

impl SyncError {
    /// I/O failure on `path`.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
