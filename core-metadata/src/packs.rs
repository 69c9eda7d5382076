//! Resource packs, data packs, shader packs and world saves.

use serde_json::Value;

use core_async::sync::CancellationToken;

use crate::archive::Source;
use crate::details::{
    ensure_live, FolderKind, ParseRequest, ResourceDetails, ResourceKind, ResourceParser,
};
use crate::error::{MetadataError, Result};

/// Opens a folder or archive resource; other kinds have nothing to read.
fn open_source(request: &ParseRequest) -> Result<Option<Source>> {
    match request.kind {
        ResourceKind::Folder => Ok(Some(Source::directory(&request.path))),
        ResourceKind::ZipArchive => Source::open_zip(&request.path).map(Some),
        ResourceKind::SingleFile | ResourceKind::LiteMod => Ok(None),
    }
}

/// Reads `pack.mcmeta` from resource packs and data packs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackParser;

impl PackParser {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceParser for PackParser {
    fn parse(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails> {
        ensure_live(cancel)?;
        let Some(mut source) = open_source(request)? else {
            return Ok(ResourceDetails::default());
        };

        ensure_live(cancel)?;
        match source.read("pack.mcmeta")? {
            Some(contents) => read_pack_mcmeta(&contents),
            None => Err(MetadataError::InvalidMetadata(
                "pack.mcmeta is missing".to_string(),
            )),
        }
    }
}

fn read_pack_mcmeta(contents: &[u8]) -> Result<ResourceDetails> {
    let doc: Value = serde_json::from_slice(contents)?;
    let pack = doc
        .get("pack")
        .and_then(Value::as_object)
        .ok_or_else(|| MetadataError::InvalidMetadata("pack.mcmeta has no pack object".to_string()))?;

    let description = pack.get("description").map(flatten_text).filter(|d| !d.is_empty());

    Ok(ResourceDetails {
        description,
        pack_format: pack.get("pack_format").and_then(Value::as_i64),
        ..Default::default()
    })
}

/// Plain text of a chat component: a string, an object with `text` and
/// `extra`, or an array of components.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts.iter().map(flatten_text).collect(),
        Value::Object(component) => {
            let mut text = component
                .get("text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(extra) = component.get("extra") {
                text.push_str(&flatten_text(extra));
            }
            text
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
    }
}

/// Accepts shader packs that contain a `shaders/` directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderPackParser;

impl ShaderPackParser {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceParser for ShaderPackParser {
    fn parse(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails> {
        ensure_live(cancel)?;
        let Some(source) = open_source(request)? else {
            return Ok(ResourceDetails::default());
        };

        if source.has_directory("shaders") {
            Ok(ResourceDetails::default())
        } else {
            Err(MetadataError::InvalidMetadata(
                "shader pack has no shaders directory".to_string(),
            ))
        }
    }
}

/// Probes world saves for `level.dat`.
///
/// Folder saves must have it at the root. Zipped saves may also nest it one
/// directory deep, which is how most downloaded worlds are packed; the
/// nested directory name becomes the details name.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldSaveParser;

impl WorldSaveParser {
    pub fn new() -> Self {
        Self
    }
}

impl ResourceParser for WorldSaveParser {
    fn parse(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails> {
        ensure_live(cancel)?;
        let Some(source) = open_source(request)? else {
            return Err(MetadataError::UnsupportedKind {
                kind: request.kind,
                folder: FolderKind::Worlds,
            });
        };

        if source.contains("level.dat") {
            return Ok(ResourceDetails::default());
        }

        if matches!(source, Source::Zip(_)) {
            ensure_live(cancel)?;
            for dir in source.top_level_dirs()? {
                if source.contains(&format!("{}/level.dat", dir)) {
                    return Ok(ResourceDetails {
                        name: Some(dir),
                        ..Default::default()
                    });
                }
            }
        }

        Err(MetadataError::InvalidMetadata("level.dat not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_mcmeta_string_description() {
        let json = br#"{"pack":{"pack_format":15,"description":"Faithful 32x"}}"#;
        let details = read_pack_mcmeta(json).unwrap();
        assert_eq!(details.pack_format, Some(15));
        assert_eq!(details.description.as_deref(), Some("Faithful 32x"));
    }

    #[test]
    fn test_pack_mcmeta_component_description() {
        let json = br#"{"pack":{"pack_format":6,"description":[{"text":"Vanilla ","color":"gold"},{"text":"Tweaks","extra":[" v2"]}]}}"#;
        let details = read_pack_mcmeta(json).unwrap();
        assert_eq!(details.description.as_deref(), Some("Vanilla Tweaks v2"));
    }

    #[test]
    fn test_pack_mcmeta_without_pack_object() {
        let result = read_pack_mcmeta(br#"{"filter":{}}"#);
        assert!(matches!(result, Err(MetadataError::InvalidMetadata(_))));
    }

    #[test]
    fn test_single_file_pack_has_no_details() {
        let request = ParseRequest::new("notes.txt", "/nowhere/notes.txt", ResourceKind::SingleFile);
        let details = PackParser::new()
            .parse(&request, &CancellationToken::new())
            .unwrap();
        assert!(details.is_empty());
    }
}
