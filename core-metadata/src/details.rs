//! Parse requests, parsed details and the parser seam.

use std::fmt;
use std::path::PathBuf;

use core_async::sync::CancellationToken;
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, Result};

/// On-disk shape of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A directory.
    Folder,
    /// A plain file that is not an archive.
    SingleFile,
    /// A `.zip` or `.jar` archive.
    ZipArchive,
    /// A LiteLoader `.litemod` archive.
    LiteMod,
}

impl ResourceKind {
    /// Classifies an entry from its enabled file name.
    ///
    /// The name must already have any disabled suffix removed, otherwise
    /// `foo.jar.disabled` would be reported as a plain file.
    pub fn classify(enabled_name: &str, is_dir: bool) -> Self {
        if is_dir {
            return Self::Folder;
        }

        let lower = enabled_name.to_ascii_lowercase();
        if lower.ends_with(".zip") || lower.ends_with(".jar") {
            Self::ZipArchive
        } else if lower.ends_with(".litemod") {
            Self::LiteMod
        } else {
            Self::SingleFile
        }
    }
}

/// The kind of content a managed folder holds. Selects the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderKind {
    Mods,
    ResourcePacks,
    DataPacks,
    ShaderPacks,
    Worlds,
}

impl FolderKind {
    /// Conventional directory name inside an instance, also used as the
    /// folder label on events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mods => "mods",
            Self::ResourcePacks => "resourcepacks",
            Self::DataPacks => "datapacks",
            Self::ShaderPacks => "shaderpacks",
            Self::Worlds => "saves",
        }
    }
}

impl fmt::Display for FolderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mod loader a manifest belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModLoader {
    Forge,
    NeoForge,
    Fabric,
    Quilt,
    LiteLoader,
}

/// Details recovered from a resource's own files.
///
/// Every field is optional: an archive without a recognised manifest parses
/// successfully into `ResourceDetails::default()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDetails {
    pub mod_id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub homepage: Option<String>,
    /// Minecraft version declared by LiteLoader manifests.
    pub game_version: Option<String>,
    pub loader: Option<ModLoader>,
    /// `pack.pack_format` from `pack.mcmeta`.
    pub pack_format: Option<i64>,
}

impl ResourceDetails {
    /// True when nothing was recovered.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything a parser needs to know about one resource.
///
/// A copy taken when the parse is scheduled. Parsers never see the live
/// resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRequest {
    pub resource_id: String,
    pub path: PathBuf,
    pub kind: ResourceKind,
}

impl ParseRequest {
    pub fn new(resource_id: impl Into<String>, path: impl Into<PathBuf>, kind: ResourceKind) -> Self {
        Self {
            resource_id: resource_id.into(),
            path: path.into(),
            kind,
        }
    }
}

/// Per-folder-kind resource parser.
///
/// Runs on a blocking worker thread. Implementations should check `cancel`
/// between expensive steps and return [`MetadataError::Cancelled`] once it
/// fires; a parser that ignores it still works, its result is discarded.
///
/// # Errors
///
/// Corrupt archives and malformed manifests are errors. Resources without any
/// recognised manifest are not.
pub trait ResourceParser: Send + Sync {
    fn parse(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails>;
}

/// Returns `Err(Cancelled)` once the token has fired.
pub fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(MetadataError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_extension() {
        assert_eq!(ResourceKind::classify("jei.jar", false), ResourceKind::ZipArchive);
        assert_eq!(ResourceKind::classify("Faithful.ZIP", false), ResourceKind::ZipArchive);
        assert_eq!(ResourceKind::classify("macros.litemod", false), ResourceKind::LiteMod);
        assert_eq!(ResourceKind::classify("notes.txt", false), ResourceKind::SingleFile);
        assert_eq!(ResourceKind::classify("world.zip", true), ResourceKind::Folder);
    }

    #[test]
    fn test_empty_details() {
        assert!(ResourceDetails::default().is_empty());

        let details = ResourceDetails {
            pack_format: Some(15),
            ..Default::default()
        };
        assert!(!details.is_empty());
    }

    #[test]
    fn test_ensure_live() {
        let token = CancellationToken::new();
        assert!(ensure_live(&token).is_ok());

        token.cancel();
        assert!(matches!(ensure_live(&token), Err(MetadataError::Cancelled)));
    }
}
