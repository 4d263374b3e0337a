use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::config::Config;
use crate::index::{HttpIndexClient, IndexClient};
use crate::process::{run_command_with_timeout, CommandOutcome};

/// A fully resolved external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            envs: Vec::new(),
            timeout: None,
        }
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

pub trait CommandRunner: Send + Sync {
    /// # Errors
    /// Returns an error when the command cannot be started or waited on.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome>;
}

pub trait Effects: Send + Sync {
    fn index(&self) -> &dyn IndexClient;
    fn runner(&self) -> &dyn CommandRunner;
}

pub struct SystemEffects {
    index: Arc<HttpIndexClient>,
    runner: Arc<SystemRunner>,
}

impl SystemEffects {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            index: Arc::new(HttpIndexClient::new(config.network())?),
            runner: Arc::new(SystemRunner),
        })
    }
}

impl Effects for SystemEffects {
    fn index(&self) -> &dyn IndexClient {
        self.index.as_ref()
    }

    fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }
}

struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        run_command_with_timeout(
            &invocation.program,
            &invocation.args,
            &invocation.envs,
            invocation.timeout,
        )
    }
}

pub type SharedEffects = Arc<dyn Effects>;
