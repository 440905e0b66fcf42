use super::serde_helpers::{
    EnvLookup, load_env_bool, load_env_bool_opt, load_env_path_opt, load_env_string, load_env_string_opt,
    load_env_var, load_env_var_opt, process_env,
};
use super::{ConfigError, EffectiveSettings, Environment, ExternalLoggerMode};
use crate::domain::{DEFAULT_TRACE_VALUE, Level};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOGGER_NAME: &str = "app";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_WEBHOOK_QUEUE_CAPACITY: usize = 1_000;
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 2_000;

/// Everything `configure` needs to build one pipeline.
#[derive(Parser, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Name of the logger the pipeline is registered under
    #[arg(long, env = "LOGGER_NAME", default_value = DEFAULT_LOGGER_NAME)]
    pub logger_name: String,

    /// Deployment profile (prod, dev, anything else)
    #[arg(long, env = "APP_ENVIRONMENT", default_value = "other")]
    pub environment: Environment,

    /// Explicit threshold; overrides the profile-derived one
    #[arg(long, env = "LOG_LEVEL")]
    pub level: Option<Level>,

    /// Threshold used in prod
    #[arg(long, env = "LOG_PROD_LEVEL", default_value = "TRACE")]
    pub prod_level: Level,

    /// Numeric position of the TRACE level
    #[arg(long, env = "LOG_TRACE_LEVEL_VALUE", default_value_t = DEFAULT_TRACE_VALUE)]
    pub trace_level_value: u8,

    /// Rotating log file; supports {pid}, {hostname} and {date}
    #[arg(long, env = "LOG_FILEPATH")]
    pub log_filepath: Option<PathBuf>,

    /// Rotate once the file would exceed this many bytes
    #[arg(long, env = "LOG_MAX_FILE_SIZE", default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: u64,

    /// Rotated files to keep; 0 truncates in place
    #[arg(long, env = "LOG_BACKUP_COUNT", default_value_t = 5)]
    pub backup_count: usize,

    /// Write events to stderr
    #[arg(long, env = "LOG_CONSOLE", default_value_t = true, action = clap::ArgAction::Set)]
    pub console_output: bool,

    /// JSON lines instead of plain text for console and file
    #[arg(long, env = "LOG_JSON", default_value_t = true, action = clap::ArgAction::Set)]
    pub json_output: bool,

    /// Pending events before new ones are dropped; 0 means unbounded
    #[arg(long, env = "LOG_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Policy for events emitted by third-party crates
    #[arg(long, env = "LOG_EXTERNAL_MODE", default_value = "auto")]
    pub external_logger_mode: ExternalLoggerMode,

    /// Threshold for captured third-party events
    #[arg(long, env = "LOG_EXTERNAL_LEVEL", default_value = "WARNING")]
    pub external_level: Level,

    /// Add process, thread and host fields to JSON; defaults by profile
    #[arg(long, env = "LOG_RUNTIME_FIELDS")]
    pub include_runtime_fields: Option<bool>,

    /// Truncate string values after this many characters; 0 disables
    #[arg(long, env = "LOG_MAX_VALUE_LENGTH", default_value_t = DEFAULT_MAX_VALUE_LENGTH)]
    pub max_value_length: usize,

    /// Endpoint receiving one JSON POST per event
    #[arg(long, env = "LOG_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Webhook request timeout in milliseconds
    #[arg(long, env = "LOG_WEBHOOK_TIMEOUT_MS", default_value_t = 5_000)]
    pub webhook_timeout_ms: u64,

    /// Minimum level sent to the webhook
    #[arg(long, env = "LOG_WEBHOOK_LEVEL", default_value = "ERROR")]
    pub webhook_level: Level,

    /// Pending webhook deliveries before new ones are dropped
    #[arg(long, env = "LOG_WEBHOOK_QUEUE_CAPACITY", default_value_t = DEFAULT_WEBHOOK_QUEUE_CAPACITY)]
    pub webhook_queue_capacity: usize,

    /// Delivery worker poll interval in milliseconds
    #[arg(long, env = "LOG_POLL_INTERVAL_MS", default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for a worker to drain at shutdown
    #[arg(long, env = "LOG_SHUTDOWN_TIMEOUT_MS", default_value_t = 10_000)]
    pub shutdown_timeout_ms: u64,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            logger_name: DEFAULT_LOGGER_NAME.to_string(),
            environment: Environment::Other,
            level: None,
            prod_level: Level::TRACE,
            trace_level_value: DEFAULT_TRACE_VALUE,
            log_filepath: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            backup_count: 5,
            console_output: true,
            json_output: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            external_logger_mode: ExternalLoggerMode::Auto,
            external_level: Level::WARNING,
            include_runtime_fields: None,
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
            webhook_url: None,
            webhook_timeout_ms: 5_000,
            webhook_level: Level::ERROR,
            webhook_queue_capacity: DEFAULT_WEBHOOK_QUEUE_CAPACITY,
            poll_interval_ms: 100,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl LoggingOptions {
    pub fn new(logger_name: impl Into<String>) -> Self {
        Self {
            logger_name: logger_name.into(),
            ..Self::default()
        }
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let options = Self::try_parse_from(args)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&process_env)
    }

    /// Builds options from defaults overridden by whatever `env` provides.
    pub fn from_env_with(env: &impl EnvLookup) -> Result<Self, ConfigError> {
        let mut options = Self::default();

        load_env_string(env, "LOGGER_NAME", &mut options.logger_name);
        load_env_var(env, "APP_ENVIRONMENT", &mut options.environment)?;
        load_env_var_opt(env, "LOG_LEVEL", &mut options.level)?;
        load_env_var(env, "LOG_PROD_LEVEL", &mut options.prod_level)?;
        load_env_var(env, "LOG_TRACE_LEVEL_VALUE", &mut options.trace_level_value)?;
        load_env_path_opt(env, "LOG_FILEPATH", &mut options.log_filepath);
        load_env_var(env, "LOG_MAX_FILE_SIZE", &mut options.max_file_size)?;
        load_env_var(env, "LOG_BACKUP_COUNT", &mut options.backup_count)?;
        load_env_bool(env, "LOG_CONSOLE", &mut options.console_output)?;
        load_env_bool(env, "LOG_JSON", &mut options.json_output)?;
        load_env_var(env, "LOG_QUEUE_CAPACITY", &mut options.queue_capacity)?;

        // Surfaces ConfigError::InvalidPolicy rather than EnvError
        if let Some(mode) = env.get("LOG_EXTERNAL_MODE") {
            options.external_logger_mode = mode.parse()?;
        }

        load_env_var(env, "LOG_EXTERNAL_LEVEL", &mut options.external_level)?;
        load_env_bool_opt(env, "LOG_RUNTIME_FIELDS", &mut options.include_runtime_fields)?;
        load_env_var(env, "LOG_MAX_VALUE_LENGTH", &mut options.max_value_length)?;
        load_env_string_opt(env, "LOG_WEBHOOK_URL", &mut options.webhook_url);
        load_env_var(env, "LOG_WEBHOOK_TIMEOUT_MS", &mut options.webhook_timeout_ms)?;
        load_env_var(env, "LOG_WEBHOOK_LEVEL", &mut options.webhook_level)?;
        load_env_var(
            env,
            "LOG_WEBHOOK_QUEUE_CAPACITY",
            &mut options.webhook_queue_capacity,
        )?;
        load_env_var(env, "LOG_POLL_INTERVAL_MS", &mut options.poll_interval_ms)?;
        load_env_var(env, "LOG_SHUTDOWN_TIMEOUT_MS", &mut options.shutdown_timeout_ms)?;

        options.validate()?;
        Ok(options)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let options: LoggingOptions = toml::from_str(&content)?;
        options.validate()?;
        Ok(options)
    }

    /// The TRACE level at its configured numeric position.
    pub fn trace_level(&self) -> Level {
        Level::trace_at(self.trace_level_value)
    }

    /// Maps a parsed level onto this configuration's scale: a `TRACE` parsed
    /// at the default position moves to `trace_level_value`, and a bare
    /// number equal to `trace_level_value` is named TRACE.
    pub fn resolve_level(&self, level: Level) -> Level {
        if level.is_trace() || level.value() == self.trace_level_value {
            self.trace_level()
        } else {
            level
        }
    }

    /// Threshold, runtime-field switch and external policy after applying the
    /// deployment profile.
    pub fn effective(&self) -> EffectiveSettings {
        let threshold = match self.level {
            Some(level) => self.resolve_level(level),
            None => self.profile_threshold(),
        };
        let include_runtime_fields = self
            .include_runtime_fields
            .unwrap_or(self.environment != Environment::Dev);

        EffectiveSettings {
            threshold,
            include_runtime_fields,
            external_mode: self.external_logger_mode.resolve(self.environment),
        }
    }

    /// A TRACE prod threshold never hides WARNING, even with TRACE placed
    /// above it.
    fn profile_threshold(&self) -> Level {
        match self.environment {
            Environment::Prod if self.prod_level.is_trace() => {
                self.trace_level().min(Level::WARNING)
            }
            Environment::Prod => self.resolve_level(self.prod_level),
            Environment::Dev | Environment::Other => Level::DEBUG,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }
}
