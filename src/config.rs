//! Configuration management for the meter registry.
//!
//! Registry-wide defaults are loaded from environment variables. A timer that
//! leaves a distribution setting unset inherits the value configured here.

use crate::error::{ConfigError, ConfigResult};
use std::env;
use std::time::Duration;

/// Highest percentile precision the registry accepts.
pub const MAX_PERCENTILE_PRECISION: u32 = 5;

/// Registry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Default rotation period of distribution statistics (default: 120s)
    pub distribution_expiry: Duration,

    /// Default number of ring buffers for distribution statistics (default: 3)
    pub distribution_buffer_length: u32,

    /// Default percentile precision in significant digits (default: 1)
    pub percentile_precision: u32,

    /// Maximum number of meters a registry will hold (default: 10000)
    pub max_meters: usize,

    /// Number of recent samples retained per timer for percentiles (default: 1024)
    pub sample_window: usize,

    /// Log level (default: "error")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `METRICS_DISTRIBUTION_EXPIRY_SECS`: statistic expiry in seconds (default: 120)
    /// - `METRICS_DISTRIBUTION_BUFFER_LENGTH`: ring buffer count (default: 3)
    /// - `METRICS_PERCENTILE_PRECISION`: significant digits, 0-5 (default: 1)
    /// - `METRICS_MAX_METERS`: meter cap per registry (default: 10000)
    /// - `METRICS_SAMPLE_WINDOW`: retained samples per timer (default: 1024)
    /// - `LOG_LEVEL`: Logging level (default: "error")
    pub fn from_env() -> ConfigResult<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();

        let defaults = Config::default();

        let expiry_secs = Self::parse_env_u64(
            "METRICS_DISTRIBUTION_EXPIRY_SECS",
            defaults.distribution_expiry.as_secs(),
        )?;
        let distribution_buffer_length = Self::parse_env_u32(
            "METRICS_DISTRIBUTION_BUFFER_LENGTH",
            defaults.distribution_buffer_length,
        )?;
        let percentile_precision =
            Self::parse_env_u32("METRICS_PERCENTILE_PRECISION", defaults.percentile_precision)?;
        let max_meters = Self::parse_env_usize("METRICS_MAX_METERS", defaults.max_meters)?;
        let sample_window = Self::parse_env_usize("METRICS_SAMPLE_WINDOW", defaults.sample_window)?;

        if distribution_buffer_length == 0 {
            return Err(ConfigError::InvalidValue {
                var: "METRICS_DISTRIBUTION_BUFFER_LENGTH".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if percentile_precision > MAX_PERCENTILE_PRECISION {
            return Err(ConfigError::InvalidValue {
                var: "METRICS_PERCENTILE_PRECISION".to_string(),
                reason: format!("Must be between 0 and {}", MAX_PERCENTILE_PRECISION),
            });
        }

        if sample_window == 0 {
            return Err(ConfigError::InvalidValue {
                var: "METRICS_SAMPLE_WINDOW".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        let log_level = env::var("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Config {
            distribution_expiry: Duration::from_secs(expiry_secs),
            distribution_buffer_length,
            percentile_precision,
            max_meters,
            sample_window,
            log_level,
        })
    }

    /// Parse an environment variable as u64 with a default value.
    fn parse_env_u64(var_name: &str, default: u64) -> ConfigResult<u64> {
        match env::var(var_name) {
            Ok(val) => val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as u32 with a default value.
    fn parse_env_u32(var_name: &str, default: u32) -> ConfigResult<u32> {
        match env::var(var_name) {
            Ok(val) => val.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }

    /// Parse an environment variable as usize with a default value.
    fn parse_env_usize(var_name: &str, default: usize) -> ConfigResult<usize> {
        match env::var(var_name) {
            Ok(val) => val.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
                var: var_name.to_string(),
                reason: format!("Must be a positive number, got: {}", val),
            }),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            distribution_expiry: Duration::from_secs(120),
            distribution_buffer_length: 3,
            percentile_precision: 1,
            max_meters: 10_000,
            sample_window: 1024,
            log_level: "error".to_string(),
        }
    }
}
