//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Session ceiling must be greater than zero")]
    InvalidSessionCeiling,

    #[error("Advance fraction must be in (0, 1]")]
    InvalidAdvanceFraction,

    #[error("Threshold {0} must be greater than zero")]
    ZeroThreshold(&'static str),

    #[error("Depth gate turns for surface must not be below moderate")]
    InvalidDepthGate,

    #[error("Invalid log filter directive: {0}")]
    InvalidLogFilter(String),
}
