#![deny(rust_2024_compatibility)]
// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Millisecond durations fit in u64
    clippy::missing_errors_doc,       // Error enums are self-describing
    clippy::module_name_repetitions,  // e.g. SinkError in sink module
    clippy::must_use_candidate        // Annotated selectively on guards and builders
)]

//! Structured, non-blocking logging pipeline.
//!
//! Application code logs through [`Logger`] handles. Each call is enriched
//! with the current correlation id and pushed onto a bounded queue without
//! ever blocking; a background worker per pipeline formats events and fans
//! them out to console, rotating file and webhook sinks.
//!
//! ```no_run
//! use rask_log_pipeline::{LoggingOptions, configure, correlation, fields, shutdown};
//!
//! let logger = configure(&LoggingOptions::new("app")).expect("valid options");
//! correlation::in_scope("req-1", || {
//!     logger.info_with("order placed", fields! { "order_id" => 99 });
//! });
//! shutdown("app");
//! ```

pub mod buffer;
pub mod config;
pub mod correlation;
pub mod diagnostics;
pub mod domain;
pub mod format;
pub mod logger;
pub mod pipeline;
pub mod sink;

pub use config::{ConfigError, Environment, ExternalLoggerMode, LoggingOptions};
pub use correlation::{CORRELATION_ID_HEADER, CorrelationExt, generate_correlation_id};
pub use domain::{FieldValue, Fields, Level, LogEvent, PipelineError};
pub use logger::{EventBuilder, Logger};
pub use pipeline::{PipelineRegistry, ShutdownGuard};
pub use sink::{Sink, SinkError};

use std::sync::OnceLock;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The process-wide registry behind the free functions below.
pub fn global_registry() -> &'static PipelineRegistry {
    static REGISTRY: OnceLock<PipelineRegistry> = OnceLock::new();
    REGISTRY.get_or_init(PipelineRegistry::new)
}

/// Configures a pipeline on the process-wide registry.
pub fn configure(options: &LoggingOptions) -> Result<Logger, PipelineError> {
    global_registry().configure(options)
}

pub fn configure_with_sinks(
    options: &LoggingOptions,
    extra_sinks: Vec<Box<dyn Sink>>,
) -> Result<Logger, PipelineError> {
    global_registry().configure_with_sinks(options, extra_sinks)
}

pub fn get_logger(name: &str) -> Logger {
    global_registry().get_logger(name)
}

/// Stops the named pipeline on the process-wide registry. Safe to call
/// any number of times.
pub fn shutdown(name: &str) -> bool {
    global_registry().shutdown(name)
}

pub fn shutdown_all() {
    global_registry().shutdown_all();
}

/// The process-wide registry is never dropped, so hold this guard in
/// `main` to drain every pipeline on the way out.
pub fn exit_guard() -> Option<ShutdownGuard> {
    global_registry().exit_guard()
}
