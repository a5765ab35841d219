// src/fetch.rs

//! Manifest fetching from the content service
//!
//! For one (app, depot, gid) triple: obtain a short-lived access token from
//! the configured authorization endpoint (retried with exponential backoff
//! on transient failures), then retrieve the manifest payload from a content
//! server, unpacking it if the payload is packaged as a single-entry zip.
//!
//! The reconciliation engine depends only on the [`ManifestSource`] trait,
//! so per-depot fetches are trivially stubbed in tests. Retries apply solely
//! to the idempotent token request; the manifest download itself is a single
//! attempt.

use crate::depot::{DepotId, Manifest};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::io::{Cursor, Read};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use zip::ZipArchive;

/// Timeout for token and manifest requests (10 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Placeholders the token URL template may use
const TEMPLATE_PLACEHOLDERS: [&str; 3] = ["appid", "depotid", "manifestid"];

/// Source of manifests for the reconciliation engine
pub trait ManifestSource {
    /// Fetch the manifest at `gid` for `depot`
    fn fetch(&self, depot: DepotId, gid: u64) -> Result<Manifest>;
}

/// Retry policy for the token request: attempt budget, exponential backoff,
/// and the transient-status predicate
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Whether an HTTP status is worth retrying
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    /// Backoff delay after the given zero-based failed attempt
    pub fn delay(&self, failed_attempts: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(failed_attempts)
    }
}

/// Outcome of one attempt inside the retry driver
pub(crate) enum Attempt<T> {
    Done(T),
    /// Transient failure, retry if budget remains
    Transient(String),
    /// Permanent failure, stop immediately
    Fatal(String),
}

/// Drive `op` under `policy`, sleeping through the injected `sleep` between
/// attempts so tests never wait on a real clock.
pub(crate) fn run_with_retry<T>(
    policy: &RetryPolicy,
    sleep: impl Fn(Duration),
    mut op: impl FnMut() -> Attempt<T>,
) -> std::result::Result<T, String> {
    let mut last_reason = String::from("no attempts made");
    for attempt in 0..policy.max_attempts {
        if attempt > 0 {
            sleep(policy.delay(attempt - 1));
        }
        match op() {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(reason) => return Err(reason),
            Attempt::Transient(reason) => {
                warn!(
                    "attempt {}/{} failed: {reason}, retrying...",
                    attempt + 1,
                    policy.max_attempts
                );
                last_reason = reason;
            }
        }
    }
    Err(format!(
        "{last_reason} (after {} attempts)",
        policy.max_attempts
    ))
}

/// Validate a token URL template up front: every placeholder must be known
pub fn validate_token_template(template: &str) -> Result<()> {
    render_token_url(template, 0, DepotId(1), 2).map(|_| ())
}

/// Render the token URL template with the concrete triple
pub fn render_token_url(template: &str, app_id: u32, depot: DepotId, gid: u64) -> Result<String> {
    let mut out = String::new();
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            return Err(Error::Usage(format!(
                "invalid token endpoint template: unclosed placeholder in {template:?}"
            )));
        };
        let name = &after[..end];
        match name {
            "appid" => out.push_str(&app_id.to_string()),
            "depotid" => out.push_str(&depot.to_string()),
            "manifestid" => out.push_str(&gid.to_string()),
            other => {
                return Err(Error::Usage(format!(
                    "invalid token endpoint template: unknown placeholder {other:?} \
                     (expected one of {})",
                    TEMPLATE_PLACEHOLDERS.join(", ")
                )))
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Unpack a packaged manifest payload
///
/// The content service may wrap the manifest in a single-entry zip; an
/// unpackaged payload is a valid, expected case and is returned as-is.
pub fn unpack_payload(data: Vec<u8>) -> Vec<u8> {
    let Ok(mut archive) = ZipArchive::new(Cursor::new(&data)) else {
        debug!("manifest payload not packaged, using raw bytes");
        return data;
    };
    for index in 0..archive.len() {
        let Ok(mut entry) = archive.by_index(index) else {
            continue;
        };
        if !entry.is_file() {
            continue;
        }
        let mut content = Vec::new();
        if entry.read_to_end(&mut content).is_ok() {
            debug!("manifest payload unpacked");
            return content;
        }
    }
    data
}

/// HTTP-backed manifest source: token endpoint plus content server
pub struct HttpManifestSource {
    client: Client,
    app_id: u32,
    token_url: String,
    server: Url,
    policy: RetryPolicy,
}

impl HttpManifestSource {
    pub fn new(app_id: u32, token_url: String, server: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::CatalogUnavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            app_id,
            token_url,
            server,
            policy: RetryPolicy::default(),
        })
    }

    /// Override the default retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Request a manifest-access token, retrying transient failures
    fn request_token(&self, depot: DepotId, gid: u64) -> std::result::Result<String, String> {
        let url = render_token_url(&self.token_url, self.app_id, depot, gid)
            .map_err(|e| e.to_string())?;
        info!("fetching request token from {url}");

        run_with_retry(&self.policy, std::thread::sleep, || {
            let response = match self.client.get(&url).send() {
                Ok(response) => response,
                Err(e) => return Attempt::Transient(e.to_string()),
            };
            let status = response.status().as_u16();
            if status == 200 {
                match response.text() {
                    Ok(token) => Attempt::Done(token.trim().to_string()),
                    Err(e) => Attempt::Transient(format!("failed to read token body: {e}")),
                }
            } else if RetryPolicy::is_retryable_status(status) {
                Attempt::Transient(format!("HTTP {status} from token endpoint"))
            } else {
                Attempt::Fatal(format!("HTTP {status} from token endpoint"))
            }
        })
    }
}

impl ManifestSource for HttpManifestSource {
    fn fetch(&self, depot: DepotId, gid: u64) -> Result<Manifest> {
        let fail = |reason: String| Error::DepotFetchFailed { depot, gid, reason };

        let token = self
            .request_token(depot, gid)
            .map_err(|reason| fail(format!("token request failed: {reason}")))?;

        let url = self
            .server
            .join(&format!("depot/{depot}/manifest/{gid}/5/{token}"))
            .map_err(|e| fail(format!("bad manifest URL: {e}")))?;
        info!("downloading manifest from {url}");

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| fail(e.to_string()))?;
        if response.status().as_u16() != 200 {
            return Err(fail(format!("HTTP {} from {url}", response.status())));
        }
        let bytes = response
            .bytes()
            .map_err(|e| fail(format!("failed to read manifest body: {e}")))?;

        Ok(Manifest {
            gid,
            content: unpack_payload(bytes.to_vec()),
        })
    }
}
