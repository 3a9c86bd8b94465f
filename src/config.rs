//! Client configuration management.
//!
//! Holds the API base URL, request timeout, and the cache validity windows
//! used by the feed and the shared resource caches.
//!
//! Configuration is stored at `~/.config/townmeet/config.json`.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for the config directory path
const APP_NAME: &str = "townmeet";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default base URL for the Townmeet REST backend
const DEFAULT_API_BASE_URL: &str = "https://api.townmeet.app";

/// Default HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default validity window for the feed snapshot, in minutes.
/// The current candidate is only worth rehydrating for a short while.
const DEFAULT_FEED_CACHE_MINUTES: i64 = 5;

/// Default validity window for list resources (my events, pending counts,
/// profile), in minutes.
const DEFAULT_RESOURCE_CACHE_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub feed_cache_minutes: i64,
    pub resource_cache_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            feed_cache_minutes: DEFAULT_FEED_CACHE_MINUTES,
            resource_cache_minutes: DEFAULT_RESOURCE_CACHE_MINUTES,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Validity window for the cached feed snapshot.
    pub fn feed_validity(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.feed_cache_minutes)
    }

    /// Validity window for cached list resources.
    pub fn resource_validity(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.resource_cache_minutes)
    }
}
