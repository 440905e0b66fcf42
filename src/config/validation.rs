use super::{ConfigError, LoggingOptions};
use crate::domain::Level;
use url::Url;

impl LoggingOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate logger name
        let name = self.logger_name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Logger name must not be empty".to_string(),
            ));
        }
        if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
            return Err(ConfigError::InvalidConfig(format!(
                "Logger name '{name}' is not a valid dotted name"
            )));
        }

        // Validate custom level position
        if self.trace_level_value == 0 || Level::is_builtin_value(self.trace_level_value) {
            return Err(ConfigError::InvalidLevel(format!(
                "trace_level_value {} collides with a built-in level",
                self.trace_level_value
            )));
        }

        // Validate file rotation
        if self.log_filepath.is_some() && self.max_file_size == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_file_size must be greater than 0".to_string(),
            ));
        }

        // Validate webhook
        if let Some(raw) = &self.webhook_url {
            let url = Url::parse(raw).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid webhook URL '{raw}': {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl(format!(
                    "Webhook URL '{raw}' must use http or https"
                )));
            }
            if self.webhook_timeout_ms == 0 {
                return Err(ConfigError::InvalidConfig(
                    "Webhook timeout must be greater than 0".to_string(),
                ));
            }
            if self.webhook_queue_capacity == 0 {
                return Err(ConfigError::InvalidConfig(
                    "Webhook queue capacity must be greater than 0".to_string(),
                ));
            }
        }

        // Validate timings
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Poll interval must be greater than 0".to_string(),
            ));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
