//! Configuration schema for hoard
//!
//! Configuration is stored at `~/.config/hoard/config.toml`

use crate::cache::{Algorithm, CacheOptions, DEFAULT_WATCH_INTERVAL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Source settings
    pub source: SourceConfig,
}

impl Config {
    /// Root directory of the cache
    pub fn cache_root(&self) -> PathBuf {
        self.cache
            .root
            .clone()
            .unwrap_or_else(super::ConfigManager::default_cache_root)
    }

    /// Engine options derived from the cache section
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions::default()
            .with_paranoid(self.cache.paranoid)
            .with_timeout(Duration::from_secs(self.cache.timeout_secs))
            .with_watch_interval(Duration::from_millis(self.cache.watch_interval_ms.max(1)))
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root (default: platform cache dir)
    pub root: Option<PathBuf>,

    /// Re-hash every store hit before serving it
    pub paranoid: bool,

    /// Seconds without a heartbeat before a temp file is reclaimed (0 = disabled)
    pub timeout_secs: u64,

    /// Poll period in milliseconds while waiting on another writer
    pub watch_interval_ms: u64,

    /// Hash algorithm digests are computed with
    pub algorithm: Algorithm,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            paranoid: false,
            timeout_secs: 0,
            watch_interval_ms: DEFAULT_WATCH_INTERVAL.as_millis() as u64,
            algorithm: Algorithm::Sha256,
        }
    }
}

/// Source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// User-Agent header sent with HTTP fetches
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("hoard/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
