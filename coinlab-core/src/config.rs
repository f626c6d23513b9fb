//! Pipeline configuration.
//!
//! Values come from (lowest to highest precedence): built-in defaults, an optional
//! TOML file, then environment variables:
//!
//! | Variable              | Default                             |
//! |-----------------------|-------------------------------------|
//! | `COINS`               | `bitcoin,ethereum`                  |
//! | `CURRENCY`            | `usd`                               |
//! | `DATA_DIR`            | `./data`                            |
//! | `API_BASE`            | `https://api.coingecko.com/api/v3`  |
//! | `TIMEOUT`             | `10` (seconds)                      |
//! | `MAX_RETRIES`         | `3` (attempts in total)             |
//! | `BACKOFF_S`           | `2` (linear back-off base, seconds) |
//! | `FETCH_INTERVAL`      | `60` (seconds)                      |
//! | `DEFAULT_COIN`        | `bitcoin`                           |
//! | `FORECAST_CACHE_SIZE` | `32`                                |
//! | `MIN_FORECAST_POINTS` | `6`                                 |
//! | `FORECAST_BACKEND`    | `auto`                              |

use crate::domain::normalize_asset_id;
use crate::forecast::MIN_MODEL_POINTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("parse config TOML: {0}")]
    Parse(String),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which forecasting back-end the operator asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    /// Seasonal auto-ARIMA when compiled in, damped Holt otherwise.
    #[default]
    Auto,
    /// Always use damped Holt smoothing.
    Holt,
}

impl FromStr for BackendPreference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "arima" => Ok(Self::Auto),
            "holt" | "ets" => Ok(Self::Holt),
            _ => Err(()),
        }
    }
}

/// Complete configuration for fetcher, store and forecaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Asset universe, lowercase ids understood by the upstream API.
    pub assets: Vec<String>,
    /// Quote currency (lowercase).
    pub currency: String,
    /// Root for `parquet/` and `logs/`.
    pub data_dir: PathBuf,
    pub api_base: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_secs: u64,
    /// Scheduler interval. Not used by the core itself.
    pub fetch_interval_secs: u64,
    /// Asset the forecaster falls back to for unknown ids.
    pub default_asset: String,
    pub forecast_cache_size: usize,
    pub min_forecast_points: usize,
    pub backend: BackendPreference,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            assets: vec!["bitcoin".into(), "ethereum".into()],
            currency: "usd".into(),
            data_dir: PathBuf::from("data"),
            api_base: DEFAULT_API_BASE.into(),
            timeout_secs: 10,
            max_retries: 3,
            backoff_secs: 2,
            fetch_interval_secs: 60,
            default_asset: "bitcoin".into(),
            forecast_cache_size: 32,
            min_forecast_points: 6,
            backend: BackendPreference::Auto,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// TOML file overlaid with the process environment.
    pub fn from_file_and_env(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    /// Overlay values from `lookup` (normally the environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(coins) = lookup("COINS") {
            self.assets = coins.split(',').map(str::to_string).collect();
        }
        if let Some(currency) = lookup("CURRENCY") {
            self.currency = currency;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(base) = lookup("API_BASE") {
            self.api_base = base;
        }
        if let Some(default_asset) = lookup("DEFAULT_COIN") {
            self.default_asset = default_asset;
        }
        parse_into(&lookup, "TIMEOUT", &mut self.timeout_secs)?;
        parse_into(&lookup, "MAX_RETRIES", &mut self.max_retries)?;
        parse_into(&lookup, "BACKOFF_S", &mut self.backoff_secs)?;
        parse_into(&lookup, "FETCH_INTERVAL", &mut self.fetch_interval_secs)?;
        parse_into(&lookup, "FORECAST_CACHE_SIZE", &mut self.forecast_cache_size)?;
        parse_into(&lookup, "MIN_FORECAST_POINTS", &mut self.min_forecast_points)?;
        if let Some(value) = lookup("FORECAST_BACKEND") {
            self.backend = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "FORECAST_BACKEND",
                value,
            })?;
        }
        self.normalize();
        Ok(())
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assets.is_empty() {
            return Err(ConfigError::Invalid("asset universe is empty".into()));
        }
        if self.currency.is_empty() {
            return Err(ConfigError::Invalid("quote currency is empty".into()));
        }
        if self.default_asset.is_empty() {
            return Err(ConfigError::Invalid("default asset is empty".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("MAX_RETRIES must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("TIMEOUT must be positive".into()));
        }
        if self.fetch_interval_secs == 0 {
            return Err(ConfigError::Invalid("FETCH_INTERVAL must be positive".into()));
        }
        if self.forecast_cache_size == 0 {
            return Err(ConfigError::Invalid(
                "FORECAST_CACHE_SIZE must be at least 1".into(),
            ));
        }
        if self.min_forecast_points < MIN_MODEL_POINTS {
            return Err(ConfigError::Invalid(format!(
                "MIN_FORECAST_POINTS must be at least {MIN_MODEL_POINTS}"
            )));
        }
        Ok(())
    }

    /// Directory holding the day partitions.
    pub fn parquet_root(&self) -> PathBuf {
        self.data_dir.join("parquet")
    }

    /// Newline-delimited JSON audit file.
    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join("logs").join("quotes.ndjson")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_secs)
    }

    fn normalize(&mut self) {
        self.assets = self
            .assets
            .iter()
            .map(|a| normalize_asset_id(a))
            .filter(|a| !a.is_empty())
            .collect();
        self.currency = self.currency.trim().to_ascii_lowercase();
        self.default_asset = normalize_asset_id(&self.default_asset);
        self.api_base = self.api_base.trim_end_matches('/').to_string();
    }
}

fn parse_into<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value })?;
    }
    Ok(())
}
