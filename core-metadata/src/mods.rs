//! Mod manifest parsing.
//!
//! Jars are probed for the manifests of each loader in a fixed order and the
//! first one found wins:
//!
//! 1. `META-INF/mods.toml` (Forge), then `META-INF/neoforge.mods.toml`
//! 2. `mcmod.info` (legacy Forge, bare array or `modList` v2 object)
//! 3. `quilt.mod.json`
//! 4. `fabric.mod.json`
//! 5. `forgeversion.properties` (the Forge jar itself)
//!
//! `.litemod` archives carry `litemod.json`. Unpacked folder mods are only
//! checked for `mcmod.info`.

use serde_json::{Map, Value};
use tracing::debug;

use core_async::sync::CancellationToken;

use crate::archive::Source;
use crate::details::{ensure_live, ModLoader, ParseRequest, ResourceDetails, ResourceKind, ResourceParser};
use crate::error::{MetadataError, Result};

const JAR_VERSION_PLACEHOLDER: &str = "${file.jarVersion}";
const UNRESOLVED_GRADLE_VERSION: &str = "task ':jar' property 'archiveVersion'";

/// Parser for the mods folder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModParser;

impl ModParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_jar(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails> {
        let mut source = Source::open_zip(&request.path)?;

        for (manifest, loader) in [
            ("META-INF/mods.toml", ModLoader::Forge),
            ("META-INF/neoforge.mods.toml", ModLoader::NeoForge),
        ] {
            ensure_live(cancel)?;
            if let Some(contents) = source.read_string(manifest)? {
                let mut details = read_mods_toml(&contents)?;
                details.loader = Some(loader);
                if details.version.as_deref() == Some(JAR_VERSION_PLACEHOLDER) {
                    ensure_live(cancel)?;
                    let manifest = source.read_string("META-INF/MANIFEST.MF")?;
                    details.version = Some(implementation_version(manifest.as_deref()));
                }
                return Ok(details);
            }
        }

        ensure_live(cancel)?;
        if let Some(contents) = source.read("mcmod.info")? {
            let mut details = read_mcmod_info(&contents)?;
            details.loader = Some(ModLoader::Forge);
            return Ok(details);
        }

        ensure_live(cancel)?;
        if let Some(contents) = source.read("quilt.mod.json")? {
            let mut details = read_quilt_mod_json(&contents)?;
            details.loader = Some(ModLoader::Quilt);
            return Ok(details);
        }

        ensure_live(cancel)?;
        if let Some(contents) = source.read("fabric.mod.json")? {
            let mut details = read_fabric_mod_json(&contents)?;
            details.loader = Some(ModLoader::Fabric);
            return Ok(details);
        }

        ensure_live(cancel)?;
        if let Some(contents) = source.read_string("forgeversion.properties")? {
            return Ok(read_forge_version(&contents));
        }

        debug!(resource_id = %request.resource_id, "No known mod manifest");
        Ok(ResourceDetails::default())
    }

    fn parse_litemod(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails> {
        let mut source = Source::open_zip(&request.path)?;
        ensure_live(cancel)?;
        match source.read("litemod.json")? {
            Some(contents) => read_litemod_json(&contents),
            None => Ok(ResourceDetails::default()),
        }
    }

    fn parse_folder(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails> {
        let mut source = Source::directory(&request.path);
        ensure_live(cancel)?;
        match source.read("mcmod.info")? {
            Some(contents) if !contents.is_empty() => read_mcmod_info(&contents),
            _ => Ok(ResourceDetails::default()),
        }
    }
}

impl ResourceParser for ModParser {
    fn parse(&self, request: &ParseRequest, cancel: &CancellationToken) -> Result<ResourceDetails> {
        ensure_live(cancel)?;
        match request.kind {
            ResourceKind::ZipArchive => self.parse_jar(request, cancel),
            ResourceKind::LiteMod => self.parse_litemod(request, cancel),
            ResourceKind::Folder => self.parse_folder(request, cancel),
            ResourceKind::SingleFile => Ok(ResourceDetails::default()),
        }
    }
}

/// Version from `Implementation-Version` in a jar manifest, `NONE` when
/// missing or left as an unexpanded Gradle property.
fn implementation_version(manifest: Option<&str>) -> String {
    let version = manifest
        .into_iter()
        .flat_map(str::lines)
        .find_map(|line| line.trim_end_matches('\r').strip_prefix("Implementation-Version: "))
        .map(str::trim)
        .unwrap_or("");

    if version.is_empty() || version.contains(UNRESOLVED_GRADLE_VERSION) {
        "NONE".to_string()
    } else {
        version.to_string()
    }
}

fn read_mods_toml(contents: &str) -> Result<ResourceDetails> {
    let root: toml::Table = toml::from_str(contents)?;

    let first = root
        .get("mods")
        .and_then(toml::Value::as_array)
        .and_then(|mods| mods.first())
        .and_then(toml::Value::as_table)
        .ok_or_else(|| MetadataError::InvalidMetadata("mods.toml has no [[mods]] table".to_string()))?;

    let field = |key: &str| first.get(key).and_then(toml::Value::as_str).map(str::to_string);
    // authors and displayURL may sit at the root or inside [[mods]]
    let either = |key: &str| {
        root.get(key)
            .and_then(toml::Value::as_str)
            .or_else(|| first.get(key).and_then(toml::Value::as_str))
            .map(str::to_string)
    };

    Ok(ResourceDetails {
        mod_id: field("modId"),
        name: field("displayName"),
        version: field("version"),
        description: field("description"),
        authors: either("authors").filter(|a| !a.is_empty()).into_iter().collect(),
        homepage: either("displayURL").and_then(|url| fix_url(&url)),
        ..Default::default()
    })
}

fn read_mcmod_info(contents: &[u8]) -> Result<ResourceDetails> {
    let doc: Value = serde_json::from_slice(contents)?;

    let list = match &doc {
        Value::Array(list) => list,
        Value::Object(object) => {
            let version = object
                .get("modinfoversion")
                .or_else(|| object.get("modListVersion"))
                .and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())));
            if version != Some(2) {
                return Err(MetadataError::InvalidMetadata(format!(
                    "unsupported mcmod.info version {:?}",
                    version
                )));
            }
            match object.get("modList").or_else(|| object.get("modlist")) {
                Some(Value::Array(list)) => list,
                _ => return Ok(ResourceDetails::default()),
            }
        }
        _ => return Ok(ResourceDetails::default()),
    };

    let Some(Value::Object(first)) = list.first() else {
        return Ok(ResourceDetails::default());
    };

    let mut authors = string_list(first.get("authorList"));
    if authors.is_empty() {
        authors = string_list(first.get("authors"));
    }

    Ok(ResourceDetails {
        mod_id: str_field(first, "modid"),
        // Unchanged template copies keep the example name
        name: str_field(first, "name").filter(|name| name != "Example Mod"),
        version: str_field(first, "version"),
        description: str_field(first, "description"),
        authors,
        homepage: str_field(first, "url").and_then(|url| fix_url(&url)),
        ..Default::default()
    })
}

fn read_fabric_mod_json(contents: &[u8]) -> Result<ResourceDetails> {
    let doc: Value = serde_json::from_slice(contents)?;
    let object = doc
        .as_object()
        .ok_or_else(|| MetadataError::InvalidMetadata("fabric.mod.json is not an object".to_string()))?;

    let schema = object.get("schemaVersion").and_then(Value::as_i64).unwrap_or(0);
    let mod_id = str_field(object, "id");

    let mut details = ResourceDetails {
        name: str_field(object, "name").or_else(|| mod_id.clone()),
        mod_id,
        version: str_field(object, "version"),
        description: str_field(object, "description"),
        ..Default::default()
    };

    if schema >= 1 {
        if let Some(Value::Array(authors)) = object.get("authors") {
            details.authors = authors
                .iter()
                .filter_map(|author| match author {
                    Value::Object(person) => str_field(person, "name"),
                    other => other.as_str().map(str::to_string),
                })
                .collect();
        }
        details.homepage = object
            .get("contact")
            .and_then(Value::as_object)
            .and_then(|contact| str_field(contact, "homepage"));
    }

    Ok(details)
}

fn read_quilt_mod_json(contents: &[u8]) -> Result<ResourceDetails> {
    let doc: Value = serde_json::from_slice(contents)?;
    let object = doc
        .as_object()
        .ok_or_else(|| MetadataError::InvalidMetadata("quilt.mod.json is not an object".to_string()))?;

    if object.get("schema_version").and_then(Value::as_i64) != Some(1) {
        return Ok(ResourceDetails::default());
    }

    let loader = object
        .get("quilt_loader")
        .and_then(Value::as_object)
        .ok_or_else(|| MetadataError::InvalidMetadata("quilt_loader is missing".to_string()))?;
    let required = |key: &str| {
        str_field(loader, key)
            .ok_or_else(|| MetadataError::InvalidMetadata(format!("quilt_loader.{} is missing", key)))
    };

    let mod_id = required("id")?;
    let version = required("version")?;
    let empty = Map::new();
    let metadata = loader.get("metadata").and_then(Value::as_object).unwrap_or(&empty);

    Ok(ResourceDetails {
        name: str_field(metadata, "name").or_else(|| Some(mod_id.clone())),
        mod_id: Some(mod_id),
        version: Some(version),
        description: str_field(metadata, "description"),
        // Contributor roles are not shown
        authors: metadata
            .get("contributors")
            .and_then(Value::as_object)
            .map(|contributors| contributors.keys().cloned().collect())
            .unwrap_or_default(),
        homepage: metadata
            .get("contact")
            .and_then(Value::as_object)
            .and_then(|contact| str_field(contact, "homepage")),
        ..Default::default()
    })
}

fn read_forge_version(contents: &str) -> ResourceDetails {
    let property = |key: &str| {
        contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .find(|(k, _)| k.trim() == key)
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "0".to_string())
    };

    let version = [
        "forge.major.number",
        "forge.minor.number",
        "forge.revision.number",
        "forge.build.number",
    ]
    .map(property)
    .join(".");

    ResourceDetails {
        mod_id: Some("Forge".to_string()),
        name: Some("Minecraft Forge".to_string()),
        version: Some(version),
        homepage: Some("http://www.minecraftforge.net/forum/".to_string()),
        loader: Some(ModLoader::Forge),
        ..Default::default()
    }
}

fn read_litemod_json(contents: &[u8]) -> Result<ResourceDetails> {
    let doc: Value = serde_json::from_slice(contents)?;
    let object = doc
        .as_object()
        .ok_or_else(|| MetadataError::InvalidMetadata("litemod.json is not an object".to_string()))?;

    let name = str_field(object, "name");
    Ok(ResourceDetails {
        mod_id: name.clone(),
        name,
        version: str_field(object, "version").or_else(|| str_field(object, "revision")),
        game_version: str_field(object, "mcversion"),
        description: str_field(object, "description"),
        authors: str_field(object, "author").into_iter().collect(),
        homepage: str_field(object, "url"),
        loader: Some(ModLoader::LiteLoader),
        ..Default::default()
    })
}

/// Non-empty string or number field.
fn str_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Prefixes scheme-less homepage links with `http://`.
fn fix_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        None
    } else if ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
    {
        Some(url.to_string())
    } else {
        Some(format!("http://{}", url))
    }
}
