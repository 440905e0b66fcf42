use anyhow::{Context, Result};
use clap::Parser;
use rask_log_pipeline::{Fields, Level, LoggingOptions, correlation};
use std::io::BufRead;
use std::path::PathBuf;

/// Reads lines from stdin and logs each one through a configured pipeline.
///
/// A line holding a JSON object is logged with its `message` key as the
/// message and every other key as a structured field.
#[derive(Parser, Debug)]
#[command(name = "rask-log-pipeline", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    options: LoggingOptions,

    /// Load pipeline options from a TOML file instead of flags
    #[arg(long, env = "CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Level every input line is logged at
    #[arg(long, default_value = "INFO")]
    line_level: Level,

    /// Correlation id attached to every line
    #[arg(long)]
    correlation_id: Option<String>,
}

fn split_line(line: &str) -> (String, Fields) {
    match serde_json::from_str::<serde_json::Value>(line) {
        Ok(serde_json::Value::Object(mut map)) => {
            let message = match map.remove("message") {
                Some(serde_json::Value::String(text)) => text,
                Some(other) => other.to_string(),
                None => String::new(),
            };
            (message, map.into_iter().collect())
        }
        _ => (line.to_string(), Fields::new()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = match &cli.config_file {
        Some(path) => LoggingOptions::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => cli.options.clone(),
    };

    let _guard = rask_log_pipeline::exit_guard();
    let logger = rask_log_pipeline::configure(&options).context("failed to configure logging")?;
    let level = options.resolve_level(cli.line_level);
    let correlation_id = cli
        .correlation_id
        .clone()
        .unwrap_or_else(rask_log_pipeline::generate_correlation_id);

    correlation::in_scope(correlation_id, || -> Result<()> {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line.context("failed to read stdin")?;
            if line.trim().is_empty() {
                continue;
            }
            let (message, fields) = split_line(&line);
            logger.log(level, message, fields);
        }
        Ok(())
    })?;

    rask_log_pipeline::shutdown(&options.logger_name);
    Ok(())
}
