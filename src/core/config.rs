//! Configuration management

use crate::core::{Error, Result, MAX_METER_VALUE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Longest period a baseline may default to
pub const MAX_PERIOD_DAYS: u32 = 3660;

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "METER_TRACKER_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub period: PeriodConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        let app_config_dir = config_dir.join("meter-tracker");

        if !app_config_dir.exists() {
            fs::create_dir_all(&app_config_dir)?;
        }

        Ok(app_config_dir.join("config.toml"))
    }

    /// Load configuration from disk, writing defaults on first run,
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            Self::read_file(&path)?
        } else {
            let config = Self::default();
            config.save_to(&path)?;
            config
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file without environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply `PER_METER_LIMIT`, `TOTAL_LIMIT`, `DEFAULT_PERIOD_DAYS` and
    /// `METER_TRACKER_DB` from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("PER_METER_LIMIT") {
            self.limits.per_meter_limit = parse_override("PER_METER_LIMIT", &value)?;
        }
        if let Some(value) = lookup("TOTAL_LIMIT") {
            self.limits.total_limit = parse_override("TOTAL_LIMIT", &value)?;
        }
        if let Some(value) = lookup("DEFAULT_PERIOD_DAYS") {
            self.period.default_period_days = parse_override("DEFAULT_PERIOD_DAYS", &value)?;
        }
        if let Some(value) = lookup("METER_TRACKER_DB") {
            if !value.trim().is_empty() {
                self.storage.database_path = Some(value.trim().to_string());
            }
        }
        Ok(())
    }

    /// Reject limits and period lengths that would make the metrics meaningless
    pub fn validate(&self) -> Result<()> {
        if self.limits.per_meter_limit <= 0 || self.limits.per_meter_limit > MAX_METER_VALUE {
            return Err(Error::Config(format!(
                "per_meter_limit must be between 1 and {}",
                MAX_METER_VALUE
            )));
        }
        if self.limits.total_limit <= 0 || self.limits.total_limit > MAX_METER_VALUE {
            return Err(Error::Config(format!(
                "total_limit must be between 1 and {}",
                MAX_METER_VALUE
            )));
        }
        let days = self.period.default_period_days;
        if days == 0 || days > MAX_PERIOD_DAYS {
            return Err(Error::Config(format!(
                "default_period_days must be between 1 and {}",
                MAX_PERIOD_DAYS
            )));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has invalid value {:?}", key, value)))
}

/// Consumption limits applied to every baseline period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Limit for each individual meter over one period
    #[serde(default = "default_per_meter_limit")]
    pub per_meter_limit: i64,
    /// Limit for all three meters combined over one period
    #[serde(default = "default_total_limit")]
    pub total_limit: i64,
}

fn default_per_meter_limit() -> i64 { 200 }
fn default_total_limit() -> i64 { 600 }

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            per_meter_limit: default_per_meter_limit(),
            total_limit: default_total_limit(),
        }
    }
}

/// Baseline period settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodConfig {
    /// Period length used when a baseline is set without an end date
    #[serde(default = "default_period_days")]
    pub default_period_days: u32,
}

fn default_period_days() -> u32 { 30 }

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            default_period_days: default_period_days(),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file (defaults to the user data directory)
    #[serde(default)]
    pub database_path: Option<String>,
}
