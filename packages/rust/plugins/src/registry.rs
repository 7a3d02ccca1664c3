//! Package registry access.
//!
//! [`Registry`] is the query seam used by version resolution. [`NpmRegistry`]
//! implements it against any npm-compatible registry: `GET <url>/<package>`
//! returns the package document, whose `versions` map carries each version's
//! `engines` (host-compatibility ranges) and `dist.tarball`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use semver::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use url::Url;

use bindery_shared::{BinderyError, RegistryConfig, Result};

use crate::range::VersionRange;

/// User-Agent string for registry requests.
const USER_AGENT: &str = concat!("Bindery/", env!("CARGO_PKG_VERSION"));

/// Process-wide HTTP session, created on first use and reused afterwards.
static SESSION: OnceCell<Client> = OnceCell::const_new();

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Download location of a published version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dist {
    pub tarball: String,
}

/// Metadata of one published version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionMeta {
    /// Host-compatibility ranges keyed by host name.
    #[serde(default)]
    pub engines: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Dist>,
}

impl VersionMeta {
    /// The compatibility range declared for `engine`, if any.
    pub fn engine_range(&self, engine: &str) -> Option<&str> {
        self.engines.get(engine).map(String::as_str)
    }
}

/// Published versions keyed by version string.
pub type VersionMap = BTreeMap<String, VersionMeta>;

/// Package document as served by the registry (only the fields we read).
#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(default)]
    versions: BTreeMap<String, VersionMeta>,
}

// ---------------------------------------------------------------------------
// Registry trait
// ---------------------------------------------------------------------------

/// Query interface over a package registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Every published version of `package_id` inside `range`.
    ///
    /// An unknown package yields an empty map.
    async fn view(&self, package_id: &str, range: &VersionRange) -> Result<VersionMap>;
}

// ---------------------------------------------------------------------------
// NpmRegistry
// ---------------------------------------------------------------------------

/// An npm-compatible HTTP registry.
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    base_url: Url,
    timeout: Duration,
}

impl NpmRegistry {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self { base_url, timeout }
    }

    /// Build a registry client from the `[registry]` config section.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Ok(Self::new(
            config.parsed_url()?,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    /// URL of the package document. Scoped ids keep their `@` and escape `/`.
    fn package_url(&self, package_id: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            package_id.replace('/', "%2f")
        )
    }

    /// Fetch the raw bytes at `url` (used for tarballs).
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let client = session().await?;
        let response = client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BinderyError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BinderyError::Network(format!("{url}: HTTP {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BinderyError::Network(format!("{url}: failed to read body: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Registry for NpmRegistry {
    #[instrument(skip(self, range), fields(range = %range))]
    async fn view(&self, package_id: &str, range: &VersionRange) -> Result<VersionMap> {
        let url = self.package_url(package_id);
        let client = session().await?;

        let response = client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| BinderyError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%url, "package not found in registry");
            return Ok(VersionMap::new());
        }
        if !status.is_success() {
            return Err(BinderyError::Network(format!("{url}: HTTP {status}")));
        }

        let packument: Packument = response
            .json()
            .await
            .map_err(|e| BinderyError::parse(format!("{url}: invalid package document: {e}")))?;

        let versions: VersionMap = packument
            .versions
            .into_iter()
            .filter(|(version, _)| {
                Version::parse(version)
                    .map(|v| range.matches(&v))
                    .unwrap_or(false)
            })
            .collect();

        debug!(count = versions.len(), "versions matching range");
        Ok(versions)
    }
}

/// Shared HTTP client, initialized at most once per process.
async fn session() -> Result<&'static Client> {
    SESSION
        .get_or_try_init(|| async {
            debug!("initializing registry session");
            Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| BinderyError::Network(format!("failed to build HTTP client: {e}")))
        })
        .await
}
