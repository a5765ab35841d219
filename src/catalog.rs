// src/catalog.rs

//! Catalog service client
//!
//! One metadata query per run against the catalog's JSON API, mapped into
//! an [`AppRecord`] and per-depot [`DepotRecord`]s, plus resolution of a
//! content server from the catalog's server pool. Per-depot records with
//! unparseable generation/size fields are dropped rather than failing the
//! whole call; partial catalog data is acceptable.

use crate::depot::{AppRecord, DepotId, DepotRecord, DepotRecords};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Timeout for catalog requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// App metadata document served by the catalog
#[derive(Debug, Deserialize)]
struct AppResponse {
    name: String,
    installdir: String,
    buildid: u64,
    #[serde(default)]
    depots: BTreeMap<String, DepotEntry>,
}

/// Per-depot record as served; gid/size arrive as strings by catalog
/// convention and may be absent for depots without a public manifest
#[derive(Debug, Deserialize)]
struct DepotEntry {
    #[serde(default)]
    gid: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    dlcappid: Option<String>,
}

/// Content server pool document
#[derive(Debug, Deserialize)]
struct ServerPoolResponse {
    servers: Vec<ContentServer>,
}

#[derive(Debug, Deserialize)]
struct ContentServer {
    host: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default = "default_https")]
    https: bool,
}

fn default_https() -> bool {
    true
}

/// Read-only client for the remote catalog service
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    /// Create a new catalog client for the given base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::CatalogUnavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch application metadata and the per-depot record map
    pub fn fetch_metadata(&self, app_id: u32) -> Result<(AppRecord, DepotRecords)> {
        let url = format!("{}/apps/{}", self.base_url, app_id);
        info!("fetching app metadata from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::CatalogUnavailable(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }
        let app: AppResponse = response
            .json()
            .map_err(|e| Error::CatalogUnavailable(format!("failed to parse metadata: {e}")))?;

        Ok(map_response(app_id, app))
    }

    /// Resolve a content server endpoint from the catalog's server pool
    pub fn content_server(&self) -> Result<Url> {
        let url = format!("{}/servers", self.base_url);
        debug!("resolving content server from {url}");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::CatalogUnavailable(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }
        let pool: ServerPoolResponse = response
            .json()
            .map_err(|e| Error::CatalogUnavailable(format!("failed to parse server pool: {e}")))?;

        let server = pool
            .servers
            .first()
            .ok_or_else(|| Error::CatalogUnavailable("server pool is empty".to_string()))?;
        server_base_url(server)
    }
}

fn server_base_url(server: &ContentServer) -> Result<Url> {
    let scheme = if server.https { "https" } else { "http" };
    let rendered = match server.port {
        Some(port) => format!("{scheme}://{}:{port}/", server.host),
        None => format!("{scheme}://{}/", server.host),
    };
    Url::parse(&rendered)
        .map_err(|e| Error::CatalogUnavailable(format!("bad content server {rendered}: {e}")))
}

/// Map the wire document into domain records, dropping depots whose
/// generation or size cannot be parsed
fn map_response(app_id: u32, app: AppResponse) -> (AppRecord, DepotRecords) {
    let mut records = DepotRecords::new();
    for (id, entry) in &app.depots {
        let Ok(depot) = id.parse::<DepotId>() else {
            debug!("skipping depot entry with non-numeric id {id:?}");
            continue;
        };
        let gid = entry.gid.as_deref().and_then(|g| g.parse::<u64>().ok());
        let size = entry.size.as_deref().and_then(|s| s.parse::<u64>().ok());
        let (Some(gid), Some(size)) = (gid, size) else {
            debug!("skipping depot {depot} without a parseable public manifest");
            continue;
        };
        let dlc_app_id = entry
            .dlcappid
            .as_deref()
            .and_then(|d| d.parse::<u32>().ok());
        records.insert(depot, DepotRecord { gid, size, dlc_app_id });
    }

    let record = AppRecord {
        app_id,
        name: app.name,
        install_dir: PathBuf::from(app.installdir),
        build_id: app.buildid,
    };
    (record, records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_response_parses_depots() {
        let app: AppResponse = serde_json::from_str(
            r#"{
                "name": "Example App",
                "installdir": "ExampleApp",
                "buildid": 444,
                "depots": {
                    "1001": {"gid": "10", "size": "2048"},
                    "1002": {"gid": "20", "size": "4096", "dlcappid": "900"}
                }
            }"#,
        )
        .unwrap();

        let (record, depots) = map_response(77, app);
        assert_eq!(record.app_id, 77);
        assert_eq!(record.name, "Example App");
        assert_eq!(record.install_dir, PathBuf::from("ExampleApp"));
        assert_eq!(record.build_id, 444);

        assert_eq!(depots.len(), 2);
        assert_eq!(depots[&DepotId(1001)].gid, 10);
        assert_eq!(depots[&DepotId(1001)].dlc_app_id, None);
        assert_eq!(depots[&DepotId(1002)].size, 4096);
        assert_eq!(depots[&DepotId(1002)].dlc_app_id, Some(900));
    }

    #[test]
    fn test_map_response_drops_partial_records() {
        let app: AppResponse = serde_json::from_str(
            r#"{
                "name": "App",
                "installdir": "App",
                "buildid": 1,
                "depots": {
                    "1": {"gid": "10", "size": "100"},
                    "2": {"gid": "not-a-number", "size": "100"},
                    "3": {"size": "100"},
                    "4": {"gid": "40"},
                    "branches": {}
                }
            }"#,
        )
        .unwrap();

        let (_, depots) = map_response(1, app);
        assert_eq!(depots.keys().copied().collect::<Vec<_>>(), vec![DepotId(1)]);
    }

    #[test]
    fn test_map_response_without_depots() {
        let app: AppResponse =
            serde_json::from_str(r#"{"name": "App", "installdir": "App", "buildid": 1}"#).unwrap();
        let (_, depots) = map_response(1, app);
        assert!(depots.is_empty());
    }

    #[test]
    fn test_server_base_url() {
        let server = ContentServer {
            host: "cache1.example.com".to_string(),
            port: None,
            https: true,
        };
        assert_eq!(
            server_base_url(&server).unwrap().as_str(),
            "https://cache1.example.com/"
        );

        let server = ContentServer {
            host: "cache2.example.com".to_string(),
            port: Some(8080),
            https: false,
        };
        assert_eq!(
            server_base_url(&server).unwrap().as_str(),
            "http://cache2.example.com:8080/"
        );
    }
}
