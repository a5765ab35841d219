// src/error.rs

//! Error types for the depotprep pipeline
//!
//! One crate-wide enum so every stage reports through the same taxonomy.
//! Per-depot failures (`DepotFetchFailed`) are isolated by the reconciliation
//! engine and only surface indirectly as `MissingManifest`; everything else
//! is fatal for its stage. `exit_code` maps the taxonomy onto the small set
//! of categorical process exit codes the tool is contracted to.

use crate::depot::{join_ids, DepotId};
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad invocation: missing directories, invalid URL template, unparsable flags
    #[error("{0}")]
    Usage(String),

    /// The input script or bundle could not be read
    #[error("failed to read input: {0}")]
    InputRead(String),

    /// A bundle archive contains no script entry
    #[error("no script entry found in {0}")]
    NoScriptFound(String),

    /// The script never establishes an application id
    #[error("malformed script: {0}")]
    MalformedScript(String),

    /// The catalog metadata query failed
    #[error("catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// One depot's manifest could not be fetched (non-fatal, isolated per depot)
    #[error("failed to fetch manifest {gid} for depot {depot}: {reason}")]
    DepotFetchFailed {
        depot: DepotId,
        gid: u64,
        reason: String,
    },

    /// After reconciliation, required depots still have no manifest
    #[error("missing necessary manifests for depots: {}", join_ids(.0))]
    MissingManifest(Vec<DepotId>),

    /// An output artifact could not be written
    #[error("failed to write output: {0}")]
    OutputWriteFailed(String),

    /// The config backup copy failed; the original config was left untouched
    #[error("failed to create config backup: {0}")]
    ConfigBackupFailed(String),

    /// The external downloader terminated with a non-zero status
    #[error("downloader terminated with a non-zero status {0}")]
    DownloaderFailed(i32),
}

impl Error {
    /// Categorical process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Usage(_) => 1,
            Error::InputRead(_) | Error::NoScriptFound(_) | Error::MalformedScript(_) => 2,
            Error::CatalogUnavailable(_)
            | Error::DepotFetchFailed { .. }
            | Error::MissingManifest(_) => 3,
            Error::OutputWriteFailed(_) | Error::ConfigBackupFailed(_) => 4,
            Error::DownloaderFailed(_) => 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_categories() {
        assert_eq!(Error::Usage("bad".into()).exit_code(), 1);
        assert_eq!(Error::InputRead("gone".into()).exit_code(), 2);
        assert_eq!(Error::MalformedScript("no app id".into()).exit_code(), 2);
        assert_eq!(Error::CatalogUnavailable("timeout".into()).exit_code(), 3);
        assert_eq!(
            Error::MissingManifest(vec![DepotId(3)]).exit_code(),
            3
        );
        assert_eq!(Error::OutputWriteFailed("disk".into()).exit_code(), 4);
        assert_eq!(Error::DownloaderFailed(2).exit_code(), 6);
    }

    #[test]
    fn test_missing_manifest_lists_depots() {
        let err = Error::MissingManifest(vec![DepotId(11), DepotId(22)]);
        assert_eq!(
            err.to_string(),
            "missing necessary manifests for depots: 11, 22"
        );
    }
}
