//! Integration tests for the resource parsers
//!
//! Fixtures are built on the fly in a temporary directory.

mod common;

use common::write_zip;
use core_async::sync::CancellationToken;
use core_metadata::{
    default_parser, FolderKind, MetadataError, ModLoader, ModParser, PackParser, ParseRequest,
    ResourceKind, ResourceParser, ShaderPackParser, WorldSaveParser,
};
use std::fs;
use tempfile::TempDir;

fn live() -> CancellationToken {
    CancellationToken::new()
}

#[test]
fn test_forge_jar_version_from_manifest() {
    let dir = TempDir::new().unwrap();
    let jar = write_zip(
        &dir.path().join("create.jar"),
        &[
            (
                "META-INF/mods.toml",
                "[[mods]]\nmodId=\"create\"\nversion=\"${file.jarVersion}\"\ndisplayName=\"Create\"\n",
            ),
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\nImplementation-Version: 0.5.1.f\n"),
            // Lower-priority manifests are ignored once mods.toml is found
            ("fabric.mod.json", r#"{"id":"wrong"}"#),
        ],
    );

    let request = ParseRequest::new("create.jar", jar, ResourceKind::ZipArchive);
    let details = ModParser::new().parse(&request, &live()).unwrap();

    assert_eq!(details.mod_id.as_deref(), Some("create"));
    assert_eq!(details.version.as_deref(), Some("0.5.1.f"));
    assert_eq!(details.loader, Some(ModLoader::Forge));
}

#[test]
fn test_neoforge_manifest_without_jar_manifest() {
    let dir = TempDir::new().unwrap();
    let jar = write_zip(
        &dir.path().join("ae2.jar"),
        &[(
            "META-INF/neoforge.mods.toml",
            "[[mods]]\nmodId=\"ae2\"\nversion=\"${file.jarVersion}\"\n",
        )],
    );

    let request = ParseRequest::new("ae2.jar", jar, ResourceKind::ZipArchive);
    let details = ModParser::new().parse(&request, &live()).unwrap();

    assert_eq!(details.loader, Some(ModLoader::NeoForge));
    assert_eq!(details.version.as_deref(), Some("NONE"));
}

#[test]
fn test_fabric_jar() {
    let dir = TempDir::new().unwrap();
    let jar = write_zip(
        &dir.path().join("sodium.jar"),
        &[(
            "fabric.mod.json",
            r#"{"schemaVersion":1,"id":"sodium","version":"0.5.8","name":"Sodium","authors":["JellySquid"]}"#,
        )],
    );

    let request = ParseRequest::new("sodium.jar", jar, ResourceKind::ZipArchive);
    let details = ModParser::new().parse(&request, &live()).unwrap();

    assert_eq!(details.name.as_deref(), Some("Sodium"));
    assert_eq!(details.authors, vec!["JellySquid".to_string()]);
    assert_eq!(details.loader, Some(ModLoader::Fabric));
}

#[test]
fn test_unknown_jar_layout_is_empty() {
    let dir = TempDir::new().unwrap();
    let jar = write_zip(&dir.path().join("lib.jar"), &[("com/example/Lib.class", "cafebabe")]);

    let request = ParseRequest::new("lib.jar", jar, ResourceKind::ZipArchive);
    let details = ModParser::new().parse(&request, &live()).unwrap();

    assert!(details.is_empty());
}

#[test]
fn test_corrupt_jar_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.jar");
    fs::write(&path, b"PK\x03\x04 truncated").unwrap();

    let request = ParseRequest::new("broken.jar", path, ResourceKind::ZipArchive);
    let result = ModParser::new().parse(&request, &live());

    assert!(matches!(result, Err(MetadataError::Archive(_))));
}

#[test]
fn test_malformed_manifest_fails() {
    let dir = TempDir::new().unwrap();
    let jar = write_zip(&dir.path().join("bad.jar"), &[("fabric.mod.json", "{ not json")]);

    let request = ParseRequest::new("bad.jar", jar, ResourceKind::ZipArchive);
    let result = ModParser::new().parse(&request, &live());

    assert!(matches!(result, Err(MetadataError::Json(_))));
}

#[test]
fn test_litemod_archive() {
    let dir = TempDir::new().unwrap();
    let litemod = write_zip(
        &dir.path().join("macros.litemod"),
        &[("litemod.json", r#"{"name":"Macros","version":"0.15.4","mcversion":"1.12.2"}"#)],
    );

    let request = ParseRequest::new("macros.litemod", litemod, ResourceKind::LiteMod);
    let details = ModParser::new().parse(&request, &live()).unwrap();

    assert_eq!(details.name.as_deref(), Some("Macros"));
    assert_eq!(details.loader, Some(ModLoader::LiteLoader));
}

#[test]
fn test_folder_mod_reads_mcmod_info() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("OldMod");
    fs::create_dir(&folder).unwrap();
    fs::write(
        folder.join("mcmod.info"),
        r#"[{"modid":"oldmod","name":"Old Mod","version":"1.0"}]"#,
    )
    .unwrap();

    let request = ParseRequest::new("OldMod", &folder, ResourceKind::Folder);
    let details = ModParser::new().parse(&request, &live()).unwrap();

    assert_eq!(details.mod_id.as_deref(), Some("oldmod"));
}

#[test]
fn test_cancelled_parse_returns_cancelled() {
    let dir = TempDir::new().unwrap();
    let jar = write_zip(&dir.path().join("x.jar"), &[("fabric.mod.json", r#"{"id":"x"}"#)]);

    let token = CancellationToken::new();
    token.cancel();

    let request = ParseRequest::new("x.jar", jar, ResourceKind::ZipArchive);
    let result = ModParser::new().parse(&request, &token);

    assert!(matches!(result, Err(MetadataError::Cancelled)));
}

#[test]
fn test_resource_pack_zip_and_folder() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(
        &dir.path().join("Faithful.zip"),
        &[("pack.mcmeta", r#"{"pack":{"pack_format":15,"description":"Faithful"}}"#)],
    );
    let folder = dir.path().join("Unpacked");
    fs::create_dir(&folder).unwrap();
    fs::write(
        folder.join("pack.mcmeta"),
        r#"{"pack":{"pack_format":4,"description":{"text":"Unpacked"}}}"#,
    )
    .unwrap();

    let parser = PackParser::new();

    let zipped = parser
        .parse(&ParseRequest::new("Faithful.zip", zip, ResourceKind::ZipArchive), &live())
        .unwrap();
    assert_eq!(zipped.pack_format, Some(15));

    let unpacked = parser
        .parse(&ParseRequest::new("Unpacked", &folder, ResourceKind::Folder), &live())
        .unwrap();
    assert_eq!(unpacked.description.as_deref(), Some("Unpacked"));
}

#[test]
fn test_pack_without_mcmeta_is_invalid() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(&dir.path().join("empty.zip"), &[("assets/", "")]);

    let result = PackParser::new().parse(
        &ParseRequest::new("empty.zip", zip, ResourceKind::ZipArchive),
        &live(),
    );

    assert!(matches!(result, Err(MetadataError::InvalidMetadata(_))));
}

#[test]
fn test_shader_pack_needs_shaders_directory() {
    let dir = TempDir::new().unwrap();
    let good = write_zip(
        &dir.path().join("BSL.zip"),
        &[("shaders/composite.fsh", "void main() {}")],
    );
    let bad = write_zip(&dir.path().join("notashader.zip"), &[("readme.txt", "hi")]);

    let parser = ShaderPackParser::new();
    assert!(parser
        .parse(&ParseRequest::new("BSL.zip", good, ResourceKind::ZipArchive), &live())
        .is_ok());
    assert!(parser
        .parse(&ParseRequest::new("notashader.zip", bad, ResourceKind::ZipArchive), &live())
        .is_err());
}

#[test]
fn test_world_save_probe() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("New World");
    fs::create_dir(&folder).unwrap();
    fs::write(folder.join("level.dat"), b"\x0a\x00\x00").unwrap();
    let nested = write_zip(
        &dir.path().join("skyblock.zip"),
        &[("Skyblock/level.dat", "nbt"), ("Skyblock/region/r.0.0.mca", "")],
    );

    let parser = WorldSaveParser::new();
    assert!(parser
        .parse(&ParseRequest::new("New World", &folder, ResourceKind::Folder), &live())
        .is_ok());

    let details = parser
        .parse(&ParseRequest::new("skyblock.zip", nested, ResourceKind::ZipArchive), &live())
        .unwrap();
    assert_eq!(details.name.as_deref(), Some("Skyblock"));

    let loose = dir.path().join("notes.txt");
    fs::write(&loose, "not a world").unwrap();
    let result = parser.parse(&ParseRequest::new("notes.txt", loose, ResourceKind::SingleFile), &live());
    assert!(matches!(result, Err(MetadataError::UnsupportedKind { .. })));
}

#[test]
fn test_default_parser_selects_by_folder_kind() {
    let dir = TempDir::new().unwrap();
    let zip = write_zip(
        &dir.path().join("vanilla.zip"),
        &[("pack.mcmeta", r#"{"pack":{"pack_format":10,"description":"dp"}}"#)],
    );
    let request = ParseRequest::new("vanilla.zip", zip, ResourceKind::ZipArchive);

    let datapacks = default_parser(FolderKind::DataPacks);
    assert_eq!(datapacks.parse(&request, &live()).unwrap().pack_format, Some(10));

    // Same archive seen as a mod has no manifest
    let mods = default_parser(FolderKind::Mods);
    assert!(mods.parse(&request, &live()).unwrap().is_empty());
}
