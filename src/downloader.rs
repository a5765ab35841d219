// src/downloader.rs

//! External downloader invocation
//!
//! One subprocess call per reconciled depot. The exact command line is
//! printed before each invocation so a dry run doubles as a script the
//! user can replay by hand. A downloader that starts but exits non-zero
//! aborts the remaining depots; one that cannot be started at all is
//! logged and skipped, since the emitted artifacts are already usable.

use crate::depot::DepotId;
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// Build the argument vector for one depot invocation
pub fn build_argv(
    app_id: u32,
    depot: DepotId,
    gid: u64,
    keylist: &Path,
    out_dir: &Path,
    install_dir: &Path,
    extra_args: &[String],
) -> Vec<String> {
    let manifest_file = out_dir.join(format!("{depot}_{gid}.manifest"));
    let mut argv = vec![
        "-app".to_string(),
        app_id.to_string(),
        "-depot".to_string(),
        depot.to_string(),
        "-validate".to_string(),
        "-depotkeys".to_string(),
        keylist.display().to_string(),
        "-manifestfile".to_string(),
        manifest_file.display().to_string(),
        "-dir".to_string(),
        install_dir.display().to_string(),
    ];
    argv.extend(extra_args.iter().cloned());
    argv
}

/// Render a command line for display, quoting arguments with spaces
fn render_command(program: &Path, argv: &[String]) -> String {
    let mut parts = vec![quote(&program.display().to_string())];
    parts.extend(argv.iter().map(|a| quote(a)));
    parts.join(" ")
}

fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}

/// Run the downloader once per reconciled depot
///
/// `gids` pairs each depot with its winning manifest generation.
pub fn run(
    program: &Path,
    app_id: u32,
    gids: &[(DepotId, u64)],
    keylist: &Path,
    out_dir: &Path,
    install_dir: &Path,
    extra_args: &[String],
    dry_run: bool,
) -> Result<()> {
    if !dry_run {
        std::fs::create_dir_all(install_dir)
            .map_err(|e| Error::OutputWriteFailed(format!("{}: {e}", install_dir.display())))?;
    }

    for &(depot, gid) in gids {
        let argv = build_argv(app_id, depot, gid, keylist, out_dir, install_dir, extra_args);
        println!("{}", render_command(program, &argv));
        if dry_run {
            continue;
        }

        info!("downloading depot {depot}");
        match Command::new(program).args(&argv).status() {
            Ok(status) => {
                if !status.success() {
                    let code = status.code().unwrap_or(-1);
                    return Err(Error::DownloaderFailed(code));
                }
            }
            Err(e) => {
                warn!("could not start {}: {e}", program.display());
            }
        }
    }
    Ok(())
}
