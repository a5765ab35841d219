// src/depot.rs

//! Depot domain types and the map-narrowing primitive
//!
//! Every pipeline stage carries mappings keyed by [`DepotId`]; the central
//! invariant is that each mapping carried forward is a subset of the key set
//! extracted from the script. [`restrict`] is the single primitive used for
//! every narrowing step so the set algebra lives in one place.
//!
//! All working sets are `BTreeMap`s: iteration order is the depot-id order,
//! which makes output ordering reproducible across runs regardless of
//! network timing.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Identifier of a depot (a content bucket within an application)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepotId(pub u32);

impl fmt::Display for DepotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DepotId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<u32>().map(DepotId)
    }
}

/// Depot id -> decryption key, sourced exclusively from the script
pub type DepotKeys = BTreeMap<DepotId, String>;

/// A manifest at a specific generation, bundled or fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// Generation id (opaque version token) this manifest describes
    pub gid: u64,
    /// Raw manifest bytes, never mutated after construction
    pub content: Vec<u8>,
}

/// Depot id -> manifest
pub type DepotManifests = BTreeMap<DepotId, Manifest>;

/// Catalog record for one depot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepotRecord {
    /// Current public generation id according to the catalog
    pub gid: u64,
    /// Declared payload size
    pub size: u64,
    /// Present when the depot belongs to downloadable content
    pub dlc_app_id: Option<u32>,
}

/// Depot id -> catalog record
pub type DepotRecords = BTreeMap<DepotId, DepotRecord>;

/// Application metadata from the catalog; absent entirely in offline mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppRecord {
    pub app_id: u32,
    pub name: String,
    pub install_dir: PathBuf,
    pub build_id: u64,
}

/// Restrict `map` to the keys present in `allowed`
///
/// The one narrowing primitive used at every reconciliation stage.
pub fn restrict<V, W>(map: BTreeMap<DepotId, V>, allowed: &BTreeMap<DepotId, W>) -> BTreeMap<DepotId, V> {
    map.into_iter()
        .filter(|(id, _)| allowed.contains_key(id))
        .collect()
}

/// Restrict `map` to an explicit id set (caller-supplied allowlist)
pub fn restrict_to_ids<V>(map: BTreeMap<DepotId, V>, allowed: &BTreeSet<DepotId>) -> BTreeMap<DepotId, V> {
    map.into_iter()
        .filter(|(id, _)| allowed.contains(id))
        .collect()
}

/// Keys of `required` that `have` lacks
pub fn missing_from<V, W>(required: &BTreeMap<DepotId, V>, have: &BTreeMap<DepotId, W>) -> Vec<DepotId> {
    required
        .keys()
        .filter(|id| !have.contains_key(id))
        .copied()
        .collect()
}

/// Render a depot id list as `"1, 2, 3"` for diagnostics
pub fn join_ids(ids: &[DepotId]) -> String {
    ids.iter()
        .map(DepotId::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
