// src/output.rs

//! Output artifacts
//!
//! Writers for the key listing, the per-depot manifest files, and the
//! application-state descriptor, plus the optional merge of the final key
//! mapping into a persisted client configuration. The config file is
//! always copied aside first; the merge never proceeds without a backup.

use crate::depot::{AppRecord, DepotKeys, DepotManifests, DepotRecords};
use crate::error::{Error, Result};
use crate::vdf;
use std::path::{Path, PathBuf};
use tracing::info;

/// Nested path to the depot-key section inside the client configuration
const CONFIG_KEY_PATH: [&str; 4] = ["InstallConfigStore", "Software", "valve", "Steam"];

/// Render the key listing: one `depot;key` line per entry
pub fn render_keylist(keys: &DepotKeys) -> String {
    keys.iter()
        .map(|(depot, key)| format!("{depot};{key}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write `{appid}_keys.txt` and return its path
pub fn write_keylist(out_dir: &Path, app_id: u32, keys: &DepotKeys) -> Result<PathBuf> {
    let path = out_dir.join(format!("{app_id}_keys.txt"));
    std::fs::write(&path, render_keylist(keys))
        .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", path.display())))?;
    Ok(path)
}

/// Write one `{depot}_{gid}.manifest` file per final manifest
pub fn write_manifests(out_dir: &Path, manifests: &DepotManifests) -> Result<()> {
    for (depot, manifest) in manifests {
        let path = out_dir.join(format!("{depot}_{}.manifest", manifest.gid));
        std::fs::write(&path, &manifest.content)
            .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", path.display())))?;
    }
    Ok(())
}

/// Build the application-state document
fn app_state_document(app: &AppRecord, records: &DepotRecords) -> vdf::Block {
    let mut depots = vdf::Block::new();
    for (depot, record) in records {
        let mut entry = vdf::Block::new();
        entry.push_str("manifest", record.gid.to_string());
        entry.push_str("size", record.size.to_string());
        if let Some(dlc_app_id) = record.dlc_app_id {
            entry.push_str("dlcappid", dlc_app_id.to_string());
        }
        depots.push_block(depot.to_string(), entry);
    }

    let mut state = vdf::Block::new();
    state.push_str("appid", app.app_id.to_string());
    state.push_str("Universe", "1");
    state.push_str("name", app.name.clone());
    state.push_str("StateFlags", "4");
    state.push_str("installdir", app.install_dir.display().to_string());
    state.push_str("buildid", app.build_id.to_string());
    state.push_block("InstalledDepots", depots);

    let mut root = vdf::Block::new();
    root.push_block("AppState", state);
    root
}

/// Write `appmanifest_{appid}.acf` (online mode only) and return its path
pub fn write_app_state(state_dir: &Path, app: &AppRecord, records: &DepotRecords) -> Result<PathBuf> {
    let path = state_dir.join(format!("appmanifest_{}.acf", app.app_id));
    let document = vdf::dump(&app_state_document(app, records));
    std::fs::write(&path, document)
        .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", path.display())))?;
    Ok(path)
}

/// Merge the final key mapping into the client configuration
///
/// Copies the config to `<stem>.bak.vdf` first; if that copy fails the
/// original is left untouched and the merge is abandoned. Returns the
/// backup path so callers can point at it when the rewrite itself fails.
pub fn merge_config(config_path: &Path, keys: &DepotKeys) -> Result<PathBuf> {
    let backup_path = config_path.with_extension("bak.vdf");
    std::fs::copy(config_path, &backup_path)
        .map_err(|e| Error::ConfigBackupFailed(format!("{}: {e}", backup_path.display())))?;
    info!("config backed up to {}", backup_path.display());

    let text = std::fs::read_to_string(config_path)
        .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", config_path.display())))?;
    let mut root = vdf::parse(&text)
        .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", config_path.display())))?;

    let mut section = &mut root;
    for segment in CONFIG_KEY_PATH {
        section = section.get_block_mut(segment).ok_or_else(|| {
            Error::OutputWriteFailed(format!(
                "{}: missing \"{segment}\" section",
                config_path.display()
            ))
        })?;
    }
    let depots = section.get_block_mut("depots").ok_or_else(|| {
        Error::OutputWriteFailed(format!(
            "{}: missing \"depots\" section",
            config_path.display()
        ))
    })?;

    // new values overwrite existing entries for the same depot id
    for (depot, key) in keys {
        let mut entry = vdf::Block::new();
        entry.push_str("DecryptionKey", key.clone());
        depots.set_block(&depot.to_string(), entry);
    }

    std::fs::write(config_path, vdf::dump(&root))
        .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", config_path.display())))?;
    Ok(backup_path)
}
