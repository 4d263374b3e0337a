use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
const DEFAULT_ALPINE_RELEASE: &str = "/etc/alpine-release";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) host: HostConfig,
    pub(crate) network: NetworkConfig,
    pub(crate) cache: CacheConfig,
    pub(crate) upload: UploadConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error if a variable holds a value that cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let timeout = match snapshot.var("WHEELS_HTTP_TIMEOUT") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("WHEELS_HTTP_TIMEOUT must be whole seconds, got `{raw}`"))?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };
        let pip_cache = snapshot.var("PIP_CACHE_DIR").map_or_else(
            || {
                dirs_next::cache_dir()
                    .unwrap_or_else(|| PathBuf::from(".cache"))
                    .join("pip")
            },
            PathBuf::from,
        );
        Ok(Self {
            host: HostConfig {
                build_arch: snapshot.var("ARCH").map(ToOwned::to_owned),
                abi: snapshot.var("ABI").map(ToOwned::to_owned),
                alpine_release: PathBuf::from(
                    snapshot
                        .var("WHEELS_ALPINE_RELEASE")
                        .unwrap_or(DEFAULT_ALPINE_RELEASE),
                ),
                platform: snapshot.var("WHEELS_PLATFORM").map(ToOwned::to_owned),
            },
            network: NetworkConfig {
                timeout: Duration::from_secs(timeout),
                keep_proxies: snapshot.var("WHEELS_KEEP_PROXIES").is_some_and(is_truthy),
            },
            cache: CacheConfig { pip_cache },
            upload: UploadConfig {
                s3_remote: snapshot
                    .var("WHEELS_BUILDER_UPLOAD_PLUGIN_REMOTE_S3")
                    .map(ToOwned::to_owned),
            },
        })
    }

    #[must_use]
    pub fn host(&self) -> &HostConfig {
        &self.host
    }

    #[must_use]
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    #[must_use]
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub fn upload(&self) -> &UploadConfig {
        &self.upload
    }
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub build_arch: Option<String>,
    pub abi: Option<String>,
    pub alpine_release: PathBuf,
    /// Explicit `{family}_{major}_{minor}` replacing the Alpine lookup.
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub timeout: Duration,
    /// Honor `HTTP(S)_PROXY`/`ALL_PROXY` for index fetches.
    pub keep_proxies: bool,
}

fn is_truthy(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub pip_cache: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub s3_remote: Option<String>,
}
