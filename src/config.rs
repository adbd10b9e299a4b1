//! Configuration management for the swap tracker
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::error::TrackerError;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub tracker: TrackerConfig,
    pub cnd: CndConfig,
    #[serde(default)]
    pub bitcoind: Option<BitcoindConfig>,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_detail_fetch_timeout_ms")]
    pub detail_fetch_timeout_ms: u64,
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
    /// Broadcast pre-signed transactions without user interaction
    #[serde(default)]
    pub auto_execute: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CndConfig {
    pub url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitcoindConfig {
    pub endpoint: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_detail_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_execution_timeout_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var("SWAP_TRACKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str)?;

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), TrackerError> {
        if self.tracker.poll_interval_ms == 0 {
            return Err(TrackerError::Config(
                "tracker.poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        if !(self.cnd.url.starts_with("http://") || self.cnd.url.starts_with("https://")) {
            return Err(TrackerError::Config(format!(
                "cnd.url must be an http(s) URL, got {:?}",
                self.cnd.url
            )));
        }

        if self.tracker.auto_execute && self.bitcoind.is_none() {
            return Err(TrackerError::Config(
                "tracker.auto_execute requires a [bitcoind] section".to_string(),
            ));
        }

        if self.bitcoind.is_some() && !self.tracker.auto_execute {
            tracing::warn!("[bitcoind] configured but auto_execute is off - it will not be used");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")?;

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    Ok(result)
}
