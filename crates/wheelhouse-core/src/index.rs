use anyhow::{Context, Result};
use reqwest::blocking::Client;
use tracing::{debug, info};
use url::Url;
use wheelhouse_domain::{HostProfile, PackageIndex};

use crate::config::NetworkConfig;

const USER_AGENT: &str = concat!("wheelhouse/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
#[error("failed to fetch wheel index {url}: {reason}")]
pub struct IndexFetchError {
    pub url: String,
    pub reason: String,
}

impl IndexFetchError {
    fn new(url: &str, reason: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Retrieves the raw listing of a wheel index.
pub trait IndexClient: Send + Sync {
    /// # Errors
    /// Returns [`IndexFetchError`] on transport failure or a non-success status.
    fn fetch(&self, url: &str) -> Result<String, IndexFetchError>;
}

pub struct HttpIndexClient {
    client: Client,
}

impl HttpIndexClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(network: &NetworkConfig) -> Result<Self> {
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(network.timeout);
        let builder = if network.keep_proxies {
            builder
        } else {
            builder.no_proxy()
        };
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl IndexClient for HttpIndexClient {
    fn fetch(&self, url: &str) -> Result<String, IndexFetchError> {
        debug!(url, "fetching wheel index");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| IndexFetchError::new(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IndexFetchError::new(url, format!("server returned {status}")));
        }
        response.text().map_err(|err| IndexFetchError::new(url, err))
    }
}

/// Directory listing of the wheels published for `host`'s platform family.
///
/// # Errors
/// Returns an error if `base` is not a valid URL.
pub fn listing_url(base: &str, host: &HostProfile) -> Result<Url> {
    family_url(base, host.family())
}

/// PEP 503 simple index handed to pip as `--extra-index-url`.
///
/// # Errors
/// Returns an error if `base` is not a valid URL.
pub fn pip_index_url(base: &str, host: &HostProfile) -> Result<Url> {
    family_url(base, &format!("{}-index", host.family()))
}

fn family_url(base: &str, segment: &str) -> Result<Url> {
    let mut base = Url::parse(base).with_context(|| format!("invalid index URL `{base}`"))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("{segment}/"))
        .with_context(|| format!("cannot derive `{segment}` index below {base}"))
}

/// Fetches and parses the host-compatible index below `base`.
///
/// # Errors
/// Returns an error if the listing cannot be fetched or any wheel name in it
/// is malformed.
pub fn load_index(client: &dyn IndexClient, base: &str, host: &HostProfile) -> Result<PackageIndex> {
    let url = listing_url(base, host)?;
    let listing = client.fetch(url.as_str())?;
    let index = PackageIndex::from_listing(&listing, host)
        .with_context(|| format!("malformed wheel listing at {url}"))?;
    info!(url = %url, packages = index.len(), "loaded wheel index");
    Ok(index)
}
