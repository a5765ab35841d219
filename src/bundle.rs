// src/bundle.rs

//! Bundle input loading
//!
//! Resolves the tool's input path into script text plus any co-located
//! manifest blobs. A bare path is literal script text; a `.zip` bundle is
//! scanned once for exactly one `.lua` entry and any `.manifest` entries.
//!
//! Manifest container formats cannot be reliably parsed here, so filename
//! convention (`<depot-id>_<gid>.manifest`) is the only identity signal;
//! anything else is skipped with a warning.

use crate::depot::{DepotId, DepotManifests, Manifest};
use crate::error::{Error, Result};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};
use zip::ZipArchive;

/// Script text plus bundled manifests, as loaded from the input path
#[derive(Debug, Clone)]
pub struct InputContent {
    pub script: String,
    pub manifests: DepotManifests,
}

/// Load the input: `-` reads script text from stdin, a `.zip` path is
/// scanned as a bundle, anything else is read as literal script text.
pub fn load_input(path: &Path) -> Result<InputContent> {
    if path.as_os_str() == "-" {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .map_err(|e| Error::InputRead(format!("stdin: {e}")))?;
        return Ok(InputContent {
            script,
            manifests: DepotManifests::new(),
        });
    }

    if path.extension().and_then(|e| e.to_str()) != Some("zip") {
        let script = std::fs::read_to_string(path)
            .map_err(|e| Error::InputRead(format!("{}: {e}", path.display())))?;
        return Ok(InputContent {
            script,
            manifests: DepotManifests::new(),
        });
    }

    load_bundle(path)
}

/// Scan a `.zip` bundle for the script entry and recognizable manifests
fn load_bundle(path: &Path) -> Result<InputContent> {
    let file =
        File::open(path).map_err(|e| Error::InputRead(format!("{}: {e}", path.display())))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| Error::InputRead(format!("{}: {e}", path.display())))?;

    // stem must be exactly <depot-id>_<gid>, both positive integers
    let manifest_name = Regex::new(r"^(\d+)_(\d+)$").expect("static pattern");

    let mut script: Option<String> = None;
    let mut manifests = DepotManifests::new();

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::InputRead(format!("{}: {e}", path.display())))?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_string();
        let base = name.rsplit('/').next().unwrap_or(&name).to_string();

        if let Some(stem) = base.strip_suffix(".lua") {
            if script.is_some() {
                info!("additional \"{base}\" skipped");
                continue;
            }
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| Error::InputRead(format!("{base}: {e}")))?;
            info!("found \"{stem}.lua\"");
            script = Some(text);
        } else if let Some(stem) = base.strip_suffix(".manifest") {
            let Some(captures) = manifest_name.captures(stem) else {
                warn!("unrecognized manifest filename \"{base}\"");
                continue;
            };
            let (Ok(depot), Ok(gid)) = (captures[1].parse::<DepotId>(), captures[2].parse::<u64>())
            else {
                warn!("unrecognized manifest filename \"{base}\"");
                continue;
            };
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| Error::InputRead(format!("{base}: {e}")))?;
            manifests.insert(depot, Manifest { gid, content });
        }
    }

    match script {
        Some(script) => Ok(InputContent { script, manifests }),
        None => Err(Error::NoScriptFound(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_bundle(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, content) in entries {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_loose_file_is_script_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unlock.lua");
        std::fs::write(&path, "addappid(1)").unwrap();

        let input = load_input(&path).unwrap();
        assert_eq!(input.script, "addappid(1)");
        assert!(input.manifests.is_empty());
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_input(&dir.path().join("nope.lua"));
        assert!(matches!(result, Err(Error::InputRead(_))));
    }

    #[test]
    fn test_bundle_with_script_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        write_bundle(
            &path,
            &[
                ("unlock.lua", b"addappid(1)".as_slice()),
                ("12345_6789.manifest", b"manifest-bytes".as_slice()),
            ],
        );

        let input = load_input(&path).unwrap();
        assert_eq!(input.script, "addappid(1)");
        let manifest = &input.manifests[&DepotId(12345)];
        assert_eq!(manifest.gid, 6789);
        assert_eq!(manifest.content, b"manifest-bytes");
    }

    #[test]
    fn test_unrecognized_manifest_name_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        write_bundle(
            &path,
            &[
                ("unlock.lua", b"addappid(1)".as_slice()),
                ("depot.manifest", b"ignored".as_slice()),
                ("12_x.manifest", b"ignored".as_slice()),
            ],
        );

        let input = load_input(&path).unwrap();
        assert!(input.manifests.is_empty());
    }

    #[test]
    fn test_first_script_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        write_bundle(
            &path,
            &[
                ("a.lua", b"addappid(1)".as_slice()),
                ("b.lua", b"addappid(2)".as_slice()),
            ],
        );

        let input = load_input(&path).unwrap();
        assert_eq!(input.script, "addappid(1)");
    }

    #[test]
    fn test_no_script_in_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        write_bundle(&path, &[("1_2.manifest", b"bytes".as_slice())]);

        assert!(matches!(load_input(&path), Err(Error::NoScriptFound(_))));
    }

    #[test]
    fn test_nested_entry_names_use_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        write_bundle(
            &path,
            &[
                ("inner/unlock.lua", b"addappid(3)".as_slice()),
                ("inner/7_8.manifest", b"nested".as_slice()),
            ],
        );

        let input = load_input(&path).unwrap();
        assert_eq!(input.script, "addappid(3)");
        assert_eq!(input.manifests[&DepotId(7)].gid, 8);
    }
}
