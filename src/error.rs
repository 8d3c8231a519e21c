//! Error types for the async timer crate.
//!
//! This module defines custom error types using `thiserror` for precise error handling.
//! Failures of the timed computations themselves are never represented here; they
//! pass through the timer untouched.

use thiserror::Error;

/// Errors raised by a meter registry while registering instruments.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// Tags supplied as a flat key/value list had an odd length
    #[error("Invalid tags: {0}")]
    InvalidTags(String),

    /// A distribution statistic setting was out of range
    #[error("Invalid distribution config for {name}: {reason}")]
    InvalidDistribution { name: String, reason: String },

    /// The id is already registered as a different kind of meter
    #[error("Meter {name} is already registered as a {existing}")]
    MeterTypeConflict { name: String, existing: &'static str },

    /// The registry refuses to create more meters
    #[error("Meter limit of {limit} reached, refusing to register {name}")]
    MeterLimitReached { name: String, limit: usize },
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has invalid value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Convenience type alias for Results with MetricsError
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Convenience type alias for Results with ConfigError
pub type ConfigResult<T> = Result<T, ConfigError>;
