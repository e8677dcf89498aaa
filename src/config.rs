//! Configuration file support for vatsim-watch.
//!
//! Loads settings from `~/.config/vatsim-watch/config.toml` on Linux
//! (or platform-appropriate location on other OSes).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{AIRPLANES_LIVE_URL, FeedClientConfig, METAR_URL, VATSIM_DATA_URL};
use crate::filter::EntityFilter;

/// Settings for the `watch` command.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Time between feed polls (human-readable, e.g., "60s").
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,

    /// Announce clients already online when the watcher starts.
    pub announce_initial: bool,

    /// Forget clients once they leave the feed, so a later logon is
    /// announced again.
    pub reannounce_after_logoff: bool,

    /// Client filters; empty watches everything.
    pub filters: Vec<EntityFilter>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            announce_initial: true,
            reannounce_after_logoff: false,
            filters: Vec::new(),
        }
    }
}

/// Deserialize a human-readable duration like "5m".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

/// Parse a human-readable duration.
///
/// Supports: ms, s, m, h (case-insensitive); a bare number is seconds.
/// Examples: "90", "500ms", "60s", "5m", "1h"
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let s_lower = s.to_ascii_lowercase();

    let num_end = s_lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s_lower.len());

    let (num_str, unit) = s_lower.split_at(num_end);
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", s))?;

    let multiplier: u64 = match unit.trim() {
        "ms" => return Ok(Duration::from_millis(num)),
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => return Err(format!("unknown duration unit: {}", unit)),
    };

    num.checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: {}", s))
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// VATSIM v3 data feed URL.
    pub vatsim_data_url: String,

    /// METAR service base URL.
    pub metar_url: String,

    /// airplanes.live API base URL.
    pub airplanes_live_url: String,

    /// Timeout for each upstream request.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,

    /// Entries shown by the `pilots` and `controllers` commands.
    pub list_limit: usize,

    /// Print statistics this often while watching; "0" disables.
    #[serde(deserialize_with = "deserialize_duration")]
    pub stats_interval: Duration,

    /// Enable Prometheus metrics HTTP endpoint.
    pub metrics_enabled: bool,

    /// Port for Prometheus metrics HTTP endpoint.
    pub metrics_port: u16,

    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vatsim_data_url: VATSIM_DATA_URL.to_string(),
            metar_url: METAR_URL.to_string(),
            airplanes_live_url: AIRPLANES_LIVE_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            list_limit: 10,
            stats_interval: Duration::from_secs(300),
            metrics_enabled: false,
            metrics_port: 9090,
            watch: WatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing default file yields the default config; an explicitly given
    /// path must exist. Returns an error if the file is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vatsim-watch/config.toml"))
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<()> {
        if self.watch.interval.is_zero() {
            anyhow::bail!("watch.interval must be greater than zero");
        }
        if self.request_timeout.is_zero() {
            anyhow::bail!("request_timeout must be greater than zero");
        }
        if self.list_limit == 0 {
            anyhow::bail!("list_limit must be at least 1");
        }
        for (i, filter) in self.watch.filters.iter().enumerate() {
            filter.validate().map_err(|e| match filter.name {
                Some(ref name) => anyhow::anyhow!("Invalid filter [{}] '{}': {}", i, name, e),
                None => anyhow::anyhow!("Invalid filter [{}]: {}", i, e),
            })?;
        }
        Ok(())
    }

    /// HTTP client settings derived from this config.
    pub fn client_config(&self) -> FeedClientConfig {
        FeedClientConfig::default()
            .with_timeout(self.request_timeout)
            .with_vatsim_data_url(self.vatsim_data_url.as_str())
            .with_metar_url(self.metar_url.as_str())
            .with_airplanes_live_url(self.airplanes_live_url.as_str())
    }
}
