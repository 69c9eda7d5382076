//! # Resource Metadata Module
//!
//! Recovers display details from the files of a managed resource.
//!
//! ## Overview
//!
//! This crate is the parse-task factory used by the folder engine:
//! - Mod manifests (Forge `mods.toml`, `mcmod.info`, Fabric, Quilt, LiteLoader)
//! - `pack.mcmeta` for resource packs and data packs
//! - Shader pack and world save validation
//! - Natural version ordering for sorting
//!
//! Parsers are synchronous and run on the engine's blocking worker pool. They
//! receive a [`ParseRequest`] copy of the resource and a cancellation token,
//! and return [`ResourceDetails`] or a [`MetadataError`]. Untrusted archive
//! content only ever produces an error, never a panic.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{default_parser, FolderKind, ParseRequest, ResourceKind};
//! use core_async::sync::CancellationToken;
//!
//! let parser = default_parser(FolderKind::Mods);
//! let request = ParseRequest::new("jei.jar", "/instance/mods/jei.jar", ResourceKind::ZipArchive);
//! let details = parser.parse(&request, &CancellationToken::new())?;
//! println!("{:?} {:?}", details.name, details.version);
//! ```

mod archive;
pub mod details;
pub mod error;
pub mod mods;
pub mod packs;
pub mod version;

use std::sync::Arc;

pub use archive::MAX_MANIFEST_BYTES;
pub use details::{
    ensure_live, FolderKind, ModLoader, ParseRequest, ResourceDetails, ResourceKind,
    ResourceParser,
};
pub use error::{MetadataError, Result};
pub use mods::ModParser;
pub use packs::{PackParser, ShaderPackParser, WorldSaveParser};
pub use version::compare_versions;

/// The parser for a folder kind.
pub fn default_parser(kind: FolderKind) -> Arc<dyn ResourceParser> {
    match kind {
        FolderKind::Mods => Arc::new(ModParser::new()),
        FolderKind::ResourcePacks | FolderKind::DataPacks => Arc::new(PackParser::new()),
        FolderKind::ShaderPacks => Arc::new(ShaderPackParser::new()),
        FolderKind::Worlds => Arc::new(WorldSaveParser::new()),
    }
}
