//! Client configuration.
//!
//! Values are layered with figment: built-in defaults, then an optional TOML
//! file, then `INGEST_MONITOR_*` environment variables, then command-line
//! overrides. A loaded [`ClientConfig`] is never mutated; [`ClientConfig::reconfigure`]
//! produces a new value instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::event_log::DEFAULT_LOG_CAPACITY;
use crate::core::monitor::{DEFAULT_POLL_INTERVAL, MonitorSettings};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "ingest-monitor.toml";

pub const ENV_PREFIX: &str = "INGEST_MONITOR_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the ingestion service.
    pub api_base: String,
    /// Sent as `X-API-Key` when set.
    pub api_key: Option<String>,
    pub poll_interval_secs: u64,
    /// Directory holding the persisted job handle.
    pub state_dir: PathBuf,
    pub log_capacity: usize,
    pub verbose: bool,
    pub json_logs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            api_key: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            state_dir: PathBuf::from(".ingest-monitor"),
            log_capacity: DEFAULT_LOG_CAPACITY,
            verbose: false,
            json_logs: false,
        }
    }
}

impl ClientConfig {
    /// Load defaults, the TOML file, and the environment, then apply
    /// `overrides` on top.
    ///
    /// `overrides` should skip unset fields when serialized so they do not
    /// mask lower layers.
    pub fn load<T: Serialize>(file: Option<&Path>, overrides: Option<&T>) -> Result<Self> {
        let file = file.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

        let mut figment = Figment::from(Serialized::defaults(ClientConfig::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX));
        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        let config: ClientConfig = figment
            .extract()
            .with_context(|| format!("Failed to load configuration ({})", file.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// A new configuration with `patch` applied. `self` is left unchanged.
    pub fn reconfigure<T: Serialize>(&self, patch: &T) -> Result<Self> {
        let config: ClientConfig = Figment::from(Serialized::defaults(self))
            .merge(Serialized::defaults(patch))
            .extract()
            .context("Failed to apply configuration overrides")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.api_base_url()?;
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.log_capacity == 0 {
            bail!("log_capacity must be greater than zero");
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.api_base)
            .with_context(|| format!("Invalid api_base {:?}", self.api_base))?;
        if url.cannot_be_a_base() {
            bail!("api_base {:?} cannot be used as a base URL", self.api_base);
        }
        Ok(url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: self.poll_interval(),
            log_capacity: self.log_capacity,
        }
    }
}
