//! Configuration file support for the habit tracker.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/habits/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub clock: ClockConfig,

    #[serde(default)]
    pub freeze: FreezeConfig,

    #[serde(default)]
    pub xp: XpConfig,

    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Reference timezone every calendar day is taken in
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct ClockConfig {
    /// Minutes east of UTC (330 for UTC+05:30, -300 for UTC-05:00)
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

/// Freeze allowance
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FreezeConfig {
    #[serde(default = "default_monthly_quota")]
    pub monthly_quota: u32,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            monthly_quota: default_monthly_quota(),
        }
    }
}

/// XP awarded per completed period
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XpConfig {
    #[serde(default = "default_base_per_period")]
    pub base_per_period: u64,

    #[serde(default = "default_excess_bonus_per_unit")]
    pub excess_bonus_per_unit: u64,
}

impl Default for XpConfig {
    fn default() -> Self {
        Self {
            base_per_period: default_base_per_period(),
            excess_bonus_per_unit: default_excess_bonus_per_unit(),
        }
    }
}

/// Recompute sweep parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_workers")]
    pub workers: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            workers: default_sweep_workers(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("habits")
}

fn default_monthly_quota() -> u32 {
    2
}

fn default_base_per_period() -> u64 {
    10
}

fn default_excess_bonus_per_unit() -> u64 {
    1
}

fn default_sweep_workers() -> usize {
    4
}

const MAX_OFFSET_MINUTES: i32 = 18 * 60;

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("habits").join("config.toml")
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.clock.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(Error::Config(format!(
                "clock.utc_offset_minutes must be within ±{}, got {}",
                MAX_OFFSET_MINUTES, self.clock.utc_offset_minutes
            )));
        }
        if self.sweep.workers == 0 {
            return Err(Error::Config("sweep.workers must be at least 1".into()));
        }
        Ok(())
    }
}
