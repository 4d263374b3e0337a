use std::sync::OnceLock;

use anyhow::Result;
use wheelhouse_domain::HostProfile;

use crate::config::Config;
use crate::effects::{CommandRunner, SharedEffects};
use crate::host::detect_host;
use crate::index::IndexClient;

#[derive(Clone, Copy, Debug)]
pub struct CommandInfo {
    pub name: &'static str,
}

impl CommandInfo {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

pub struct CommandContext {
    config: Config,
    host: OnceLock<HostProfile>,
    effects: SharedEffects,
}

impl CommandContext {
    #[must_use]
    pub fn new(config: Config, effects: SharedEffects) -> Self {
        Self {
            config,
            host: OnceLock::new(),
            effects,
        }
    }

    /// Pins the host profile instead of detecting it from the environment.
    #[must_use]
    pub fn with_host(self, host: HostProfile) -> Self {
        let _ = self.host.set(host);
        self
    }

    /// The build host, detected on first use.
    ///
    /// # Errors
    /// Returns an error if the host cannot be detected from the configuration.
    pub fn host(&self) -> Result<&HostProfile> {
        if let Some(host) = self.host.get() {
            return Ok(host);
        }
        let detected = detect_host(self.config.host())?;
        Ok(self.host.get_or_init(|| detected))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &dyn IndexClient {
        self.effects.index()
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.effects.runner()
    }
}
