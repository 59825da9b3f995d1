//! Environment-driven configuration.
//!
//! Read after `.env` has been loaded, so a local `.env` file and the process
//! environment behave the same. CLI flags override these values.

use std::time::Duration;

use thiserror::Error;

use crate::poller::PollerConfig;

pub const API_KEY_VAR: &str = "T212_API_KEY";
pub const BASE_URL_VAR: &str = "T212_BASE_URL";
pub const BUCKET_VAR: &str = "BUCKET_NAME";
pub const SUBMIT_INTERVAL_VAR: &str = "T212_SUBMIT_INTERVAL_SECS";
pub const SETTLE_DELAY_VAR: &str = "T212_SETTLE_DELAY_SECS";
pub const POLL_INTERVAL_VAR: &str = "T212_POLL_INTERVAL_SECS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set. Add it to the environment or a .env file")]
    Missing(&'static str),
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub bucket: Option<String>,
    pub poller: PollerConfig,
}

impl ExportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset and
    /// unparseable intervals fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());
        let secs = |key: &str, default: Duration| {
            get(key)
                .and_then(|val| val.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;
        let defaults = PollerConfig::default();
        let poller = PollerConfig {
            submit_interval: secs(SUBMIT_INTERVAL_VAR, defaults.submit_interval),
            settle_delay: secs(SETTLE_DELAY_VAR, defaults.settle_delay),
            poll_interval: secs(POLL_INTERVAL_VAR, defaults.poll_interval),
            ..defaults
        };

        Ok(Self {
            api_key,
            base_url: get(BASE_URL_VAR),
            bucket: get(BUCKET_VAR),
            poller,
        })
    }
}
