use crate::config::ConfigError;
use crate::sink::SinkError;
use thiserror::Error;

/// Top-level error type for pipeline management.
///
/// Logging calls never return this; only `configure` and friends do.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Failed to spawn {thread}: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: std::io::Error,
    },
}
