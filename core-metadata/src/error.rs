use thiserror::Error;

use crate::details::{FolderKind, ResourceKind};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Malformed JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed TOML manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("{kind:?} resources cannot be parsed in a {folder:?} folder")]
    UnsupportedKind {
        kind: ResourceKind,
        folder: FolderKind,
    },

    #[error("Parse cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MetadataError>;
