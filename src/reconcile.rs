// src/reconcile.rs

//! Reconciliation engine
//!
//! Combines extracted keys, bundled manifests, and catalog state into the
//! final (depot -> manifest) set the downloader needs. Precedence:
//!
//! - a bundled manifest satisfies its depot unless `update` is set and the
//!   catalog advertises a different generation
//! - anything still uncovered is fetched through a [`ManifestSource`];
//!   each fetch failure is isolated to its depot
//! - a depot with a key but no manifest after all of that is fatal
//!
//! Every narrowing step goes through [`depot::restrict`], and the final
//! manifest set is re-derived from the catalog record set so output
//! ordering never depends on fetch completion order.

use crate::depot::{
    missing_from, restrict, DepotKeys, DepotManifests, DepotRecords,
};
use crate::error::{Error, Result};
use crate::fetch::ManifestSource;
use std::collections::BTreeSet;
use tracing::warn;

/// Final working sets after reconciliation
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Keys for every depot that will be emitted
    pub keys: DepotKeys,
    /// Winning manifest per depot, in catalog record order
    pub manifests: DepotManifests,
    /// Catalog records narrowed to the emitted depots; empty offline
    pub records: DepotRecords,
}

/// Offline reconciliation: the bundled manifests are all there is
pub fn reconcile_offline(keys: DepotKeys, bundled: DepotManifests) -> Result<Reconciled> {
    let manifests = restrict(bundled, &keys);

    let missing = missing_from(&keys, &manifests);
    if !missing.is_empty() {
        return Err(Error::MissingManifest(missing));
    }

    Ok(Reconciled {
        keys,
        manifests,
        records: DepotRecords::new(),
    })
}

/// Online reconciliation against catalog records, fetching missing or
/// outdated manifests through `source` when one is configured
pub fn reconcile_online(
    keys: DepotKeys,
    bundled: DepotManifests,
    records: DepotRecords,
    source: Option<&dyn ManifestSource>,
    update: bool,
) -> Result<Reconciled> {
    let bundled = restrict(bundled, &keys);

    for depot in missing_from(&keys, &records) {
        warn!("unknown depot {depot} will be skipped");
    }
    let keys = restrict(keys, &records);
    let mut manifests = restrict(bundled, &records);

    if let Some(source) = source {
        let mut candidates: BTreeSet<_> = missing_from(&keys, &manifests).into_iter().collect();

        if update {
            for (depot, manifest) in &manifests {
                if records[depot].gid != manifest.gid {
                    warn!("outdated manifest for depot {depot}");
                    candidates.insert(*depot);
                }
            }
        }

        for depot in candidates {
            let gid = records[&depot].gid;
            match source.fetch(depot, gid) {
                Ok(manifest) => {
                    manifests.insert(depot, manifest);
                }
                Err(e) => {
                    warn!("failed to download manifest file for depot {depot}: {e}");
                }
            }
        }
    }

    // re-derive ordering from the catalog record set, not fetch order
    let records = restrict(records, &manifests);
    let manifests = restrict(manifests, &records);

    let missing = missing_from(&keys, &manifests);
    if !missing.is_empty() {
        return Err(Error::MissingManifest(missing));
    }

    Ok(Reconciled {
        keys,
        manifests,
        records,
    })
}
