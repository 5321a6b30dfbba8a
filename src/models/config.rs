//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::GeoPoint;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chat that receives notifications when a query names none
    #[serde(default)]
    pub default_chat: String,

    /// Remote search API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Global request spacing
    #[serde(default)]
    pub transport: TransportConfig,

    /// Poll rotation settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Duplicate notification suppression
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Snapshot persistence
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Area code coordinates
    #[serde(default)]
    pub geo: Vec<GeoPoint>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(AppError::validation("api.base_url is empty"));
        }
        url::Url::parse(&self.api.base_url)?;
        if self.api.user_agent.trim().is_empty() {
            return Err(AppError::validation("api.user_agent is empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(AppError::validation("api.timeout_secs must be > 0"));
        }
        if self.dedup.ttl_secs == 0 {
            return Err(AppError::validation("dedup.ttl_secs must be > 0"));
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(AppError::validation("storage.data_dir is empty"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_chat: String::new(),
            api: ApiConfig::default(),
            transport: TransportConfig::default(),
            scheduler: SchedulerConfig::default(),
            dedup: DedupConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            geo: Vec::new(),
        }
    }
}

/// Remote search API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Search endpoint
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Prefix joined with a listing id to build its public link
    #[serde(default = "defaults::item_link_base")]
    pub item_link_base: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-page request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            item_link_base: defaults::item_link_base(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Pause after each response before the next request may start
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl TransportConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: defaults::request_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between two rotations over all jobs
    #[serde(default = "defaults::cycle_pause")]
    pub cycle_pause_secs: u64,
}

impl SchedulerConfig {
    pub fn cycle_pause(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_pause_secs: defaults::cycle_pause(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// How long a sent notification suppresses an identical one
    #[serde(default = "defaults::dedup_ttl")]
    pub ttl_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::dedup_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the bucketed key-value store
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // API defaults
    pub fn base_url() -> String {
        "https://api.wallapop.com/api/v3/general/search".into()
    }
    pub fn item_link_base() -> String {
        "http://p.wallapop.com/i/".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; listing-watcher/0.1)".into()
    }
    pub fn timeout() -> u64 {
        10
    }

    // Transport defaults
    pub fn request_delay() -> u64 {
        1000
    }

    // Scheduler defaults
    pub fn cycle_pause() -> u64 {
        5
    }

    // Dedup defaults
    pub fn dedup_ttl() -> u64 {
        6 * 60 * 60
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
