//! Statship configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StatshipError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatshipConfig {
    #[serde(default = "default_db_path")]
    pub database_path: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

fn default_db_path() -> String {
    StatshipConfig::home_dir()
        .join("statship.db")
        .to_string_lossy()
        .into_owned()
}

impl Default for StatshipConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            scheduler: SchedulerConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl StatshipConfig {
    /// Load config from the default path (~/.statship/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| StatshipError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| StatshipError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| StatshipError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Statship home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".statship")
    }
}

/// Scheduler tick and dedup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-checks. The due window is slightly wider than
    /// this so a job on the tick boundary is never missed.
    #[serde(default = "default_tick_secs")]
    pub tick_interval_secs: u64,
}

fn default_tick_secs() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_secs(),
        }
    }
}

/// Delivery timeouts for outbound transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
    #[serde(default = "default_summary_timeout")]
    pub summary_timeout_secs: u64,
}

fn default_send_timeout() -> u64 {
    30
}
fn default_summary_timeout() -> u64 {
    30
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: default_send_timeout(),
            summary_timeout_secs: default_summary_timeout(),
        }
    }
}
