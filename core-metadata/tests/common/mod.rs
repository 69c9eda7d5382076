//! Fixture helpers shared by the parser tests

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

/// Writes a zip archive with the given entries. Entries ending in `/` become
/// directories.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let file = File::create(path).expect("create zip fixture");
    let mut writer = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    for (name, contents) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(contents.as_bytes()).expect("write entry");
        }
    }

    writer.finish().expect("finish zip fixture");
    path.to_path_buf()
}
