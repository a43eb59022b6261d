//! Configuration management for Recast
//!
//! The whole process is driven by one explicit `Config` value handed to the
//! fleet orchestrator at construction. Nothing in the core reads the
//! environment directly, so tests can inject fake base endpoints.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::types::Network;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub endpoints: EndpointsConfig,

    #[serde(default)]
    pub scheduling: SchedulingConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Optional posts-per-hour caps keyed by network name.
    #[serde(default)]
    pub rate_limits: HashMap<String, u32>,
}

/// Base URLs for the collaborator services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    pub inventory_base: String,
    pub variant_base: String,
    pub instagram_base: String,
    pub tiktok_base: String,
    pub youtube_base: String,
}

impl EndpointsConfig {
    pub fn publish_base(&self, network: Network) -> &str {
        match network {
            Network::Instagram => &self.instagram_base,
            Network::Tiktok => &self.tiktok_base,
            Network::Youtube => &self.youtube_base,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Maximum posts per account per day; extra schedule slots are dropped.
    #[serde(default = "default_posts_per_day")]
    pub posts_per_day: usize,

    /// Symmetric random offset bound applied to every fire instant.
    #[serde(default = "default_jitter_minutes")]
    pub jitter_minutes: i64,

    /// Seconds between fleet discovery passes, and the backoff when the
    /// account set comes back empty.
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            posts_per_day: default_posts_per_day(),
            jitter_minutes: default_jitter_minutes(),
            discovery_interval_secs: default_discovery_interval(),
        }
    }
}

/// Per-call timeouts for outbound collaborator requests. Expiry is an
/// ordinary failure of that call, never process-fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_inventory_timeout")]
    pub inventory_secs: u64,

    /// Variant generation runs a transcode and can legitimately be slow.
    #[serde(default = "default_long_call_timeout")]
    pub variant_secs: u64,

    #[serde(default = "default_long_call_timeout")]
    pub publish_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            inventory_secs: default_inventory_timeout(),
            variant_secs: default_long_call_timeout(),
            publish_secs: default_long_call_timeout(),
        }
    }
}

fn default_posts_per_day() -> usize {
    3
}

fn default_jitter_minutes() -> i64 {
    15
}

fn default_discovery_interval() -> u64 {
    600
}

fn default_inventory_timeout() -> u64 {
    30
}

fn default_long_call_timeout() -> u64 {
    300
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed base URLs before any task starts.
    pub fn validate(&self) -> Result<()> {
        let urls = [
            ("inventory", &self.endpoints.inventory_base),
            ("variant", &self.endpoints.variant_base),
            ("instagram", &self.endpoints.instagram_base),
            ("tiktok", &self.endpoints.tiktok_base),
            ("youtube", &self.endpoints.youtube_base),
        ];
        for (service, url) in urls {
            if reqwest::Url::parse(url).is_err() {
                return Err(ConfigError::InvalidBaseUrl {
                    service: service.to_string(),
                    url: url.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Resolve the configuration file path following the XDG Base Directory convention
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("RECAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("recast").join("config.toml"))
}
