// src/cli.rs
//! Command-line interface definition
//!
//! Flags only, no subcommands; the pipeline is a single operation. All
//! cross-flag validation (catalog requirement, directory preflight,
//! token template shape) lives in `main`, keeping this module purely
//! declarative.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depotprep")]
#[command(version)]
#[command(
    about = "Extract depot keys from a script bundle and prepare manifests for download",
    long_about = None
)]
pub struct Cli {
    /// Input script or zip bundle; `-` reads a script from stdin
    pub input: PathBuf,

    /// Restrict processing to these depot ids (default: all found in the script)
    #[arg(long = "depots", value_name = "ID")]
    pub depots: Vec<u32>,

    /// Directory for the key list and manifest files
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    pub out_dir: PathBuf,

    /// Directory for the application-state descriptor (default: the output directory)
    #[arg(long = "state-dir", value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Skip the catalog entirely and use bundled manifests only
    #[arg(short = 'f', long = "offline")]
    pub offline: bool,

    /// Re-fetch bundled manifests that are older than the catalog generation
    #[arg(short = 'u', long = "update")]
    pub update: bool,

    /// Token endpoint template; placeholders {appid}, {depotid}, {manifestid}
    #[arg(short = 'a', long = "token-url", value_name = "TEMPLATE")]
    pub token_url: Option<String>,

    /// Base URL of the catalog service (required unless --offline)
    #[arg(long = "catalog-url", value_name = "URL")]
    pub catalog_url: Option<String>,

    /// Directory the downloader writes app files into (default: the output directory)
    #[arg(short = 'd', long = "download-dir", value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Print downloader command lines without running them
    #[arg(short = 'D', long = "dry-download")]
    pub dry_download: bool,

    /// Downloader executable to invoke
    #[arg(long = "downloader", default_value = "depotdownloader")]
    pub downloader: PathBuf,

    /// Extra arguments appended to every downloader invocation (shell-quoted)
    #[arg(long = "downloader-args", value_name = "ARGS")]
    pub downloader_args: Option<String>,

    /// Client configuration file to merge the final keys into
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["depotprep", "bundle.zip"]);
        assert_eq!(cli.input, PathBuf::from("bundle.zip"));
        assert_eq!(cli.out_dir, PathBuf::from("."));
        assert!(cli.depots.is_empty());
        assert!(!cli.offline);
        assert!(!cli.update);
        assert!(!cli.dry_download);
        assert_eq!(cli.downloader, PathBuf::from("depotdownloader"));
        assert!(cli.catalog_url.is_none());
    }

    #[test]
    fn test_repeated_depot_flag() {
        let cli = Cli::parse_from([
            "depotprep",
            "--depots",
            "1001",
            "--depots",
            "1002",
            "app.lua",
        ]);
        assert_eq!(cli.depots, vec![1001, 1002]);
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "depotprep",
            "-f",
            "-u",
            "-o",
            "out",
            "-a",
            "https://t.example/{appid}/{depotid}/{manifestid}",
            "-D",
            "-",
        ]);
        assert!(cli.offline);
        assert!(cli.update);
        assert!(cli.dry_download);
        assert_eq!(cli.out_dir, PathBuf::from("out"));
        assert_eq!(cli.input, PathBuf::from("-"));
        assert!(cli.token_url.is_some());
    }
}
