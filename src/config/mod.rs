mod options;
pub mod serde_helpers;
mod validation;

use crate::domain::Level;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid external logger mode: {0} (expected auto, silence, capture or leave-alone)")]
    InvalidPolicy(String),
    #[error("Invalid level: {0}")]
    InvalidLevel(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

/// Deployment profile read from `APP_ENVIRONMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Production: `prod_level` threshold, runtime fields, captured external events.
    Prod,
    /// Local development: everything from DEBUG, no runtime fields.
    Dev,
    /// Anything else (staging, test, unset).
    #[default]
    Other,
}

impl Environment {
    pub fn is_prod(self) -> bool {
        self == Environment::Prod
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Prod => "prod",
            Environment::Dev => "dev",
            Environment::Other => "other",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Environment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

impl FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Environment::Prod,
            "dev" | "development" | "local" => Environment::Dev,
            _ => Environment::Other,
        })
    }
}

/// What happens to events emitted by third-party crates through the
/// `tracing` and `log` ecosystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalLoggerMode {
    /// Capture in prod, silence everywhere else.
    #[default]
    Auto,
    /// Drop external events entirely.
    #[value(alias = "disable")]
    #[serde(alias = "disable")]
    Silence,
    /// Forward external events into the pipeline.
    #[value(alias = "propagate")]
    #[serde(alias = "propagate")]
    Capture,
    /// Leave the ecosystem untouched.
    #[value(alias = "keep")]
    #[serde(alias = "keep")]
    LeaveAlone,
}

impl ExternalLoggerMode {
    /// Resolves `Auto` against the deployment profile.
    pub fn resolve(self, environment: Environment) -> Self {
        match self {
            ExternalLoggerMode::Auto if environment.is_prod() => ExternalLoggerMode::Capture,
            ExternalLoggerMode::Auto => ExternalLoggerMode::Silence,
            other => other,
        }
    }
}

impl FromStr for ExternalLoggerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "auto" => Ok(ExternalLoggerMode::Auto),
            "silence" | "disable" => Ok(ExternalLoggerMode::Silence),
            "capture" | "propagate" => Ok(ExternalLoggerMode::Capture),
            "leave-alone" | "keep" => Ok(ExternalLoggerMode::LeaveAlone),
            _ => Err(ConfigError::InvalidPolicy(s.to_string())),
        }
    }
}

impl fmt::Display for ExternalLoggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExternalLoggerMode::Auto => "auto",
            ExternalLoggerMode::Silence => "silence",
            ExternalLoggerMode::Capture => "capture",
            ExternalLoggerMode::LeaveAlone => "leave-alone",
        })
    }
}

/// Settings derived from [`LoggingOptions`] and the deployment profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveSettings {
    pub threshold: Level,
    pub include_runtime_fields: bool,
    pub external_mode: ExternalLoggerMode,
}

pub use options::{
    DEFAULT_LOGGER_NAME, DEFAULT_MAX_FILE_SIZE, DEFAULT_MAX_VALUE_LENGTH, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_WEBHOOK_QUEUE_CAPACITY, LoggingOptions,
};
