use rask_log_pipeline::format::TextFormatter;
use rask_log_pipeline::sink::{MemoryHandle, MemorySink};
use rask_log_pipeline::{
    Environment, ExternalLoggerMode, Level, Logger, LoggingOptions, PipelineRegistry,
};
use std::sync::Arc;

fn configure(
    registry: &PipelineRegistry,
    options: LoggingOptions,
    sink_level: Level,
) -> (Logger, MemoryHandle) {
    let sink = MemorySink::new(Arc::new(TextFormatter), sink_level);
    let handle = sink.handle();
    let logger = registry
        .configure_with_sinks(&options, vec![Box::new(sink)])
        .unwrap();
    (logger, handle)
}

fn base(name: &str, environment: Environment) -> LoggingOptions {
    LoggingOptions {
        environment,
        console_output: false,
        external_logger_mode: ExternalLoggerMode::LeaveAlone,
        poll_interval_ms: 10,
        ..LoggingOptions::new(name)
    }
}

fn emit_every_level(logger: &Logger) {
    logger.debug("debug");
    logger.info("info");
    logger.trace("trace");
    logger.warning("warning");
    logger.error("error");
    logger.critical("critical");
}

fn levels(handle: &MemoryHandle) -> Vec<String> {
    handle.events().iter().map(|e| e.level.name()).collect()
}

#[test]
fn test_prod_profile_passes_trace_and_above() {
    let registry = PipelineRegistry::new();
    let (logger, handle) = configure(&registry, base("prod", Environment::Prod), Level::DEBUG);
    emit_every_level(&logger);
    registry.shutdown_all();

    assert_eq!(levels(&handle), ["TRACE", "WARNING", "ERROR", "CRITICAL"]);
}

#[test]
fn test_prod_profile_keeps_warning_when_trace_sits_above_it() {
    let registry = PipelineRegistry::new();
    let options = LoggingOptions {
        trace_level_value: 35,
        ..base("prod-high", Environment::Prod)
    };
    let (logger, handle) = configure(&registry, options, Level::DEBUG);
    emit_every_level(&logger);
    registry.shutdown_all();

    assert_eq!(levels(&handle), ["TRACE", "WARNING", "ERROR", "CRITICAL"]);
    assert_eq!(handle.events()[0].level.value(), 35);
}

#[test]
fn test_dev_profile_passes_everything() {
    let registry = PipelineRegistry::new();
    let (logger, handle) = configure(&registry, base("dev", Environment::Dev), Level::DEBUG);
    assert!(logger.is_enabled_for(Level::DEBUG));
    emit_every_level(&logger);
    registry.shutdown_all();

    assert_eq!(
        levels(&handle),
        ["DEBUG", "INFO", "TRACE", "WARNING", "ERROR", "CRITICAL"]
    );
}

#[test]
fn test_explicit_level_overrides_profile() {
    let registry = PipelineRegistry::new();
    let options = LoggingOptions {
        level: Some(Level::ERROR),
        ..base("explicit", Environment::Dev)
    };
    let (logger, handle) = configure(&registry, options, Level::DEBUG);
    assert!(!logger.is_enabled_for(Level::WARNING));
    assert!(logger.is_enabled_for(Level::ERROR));
    emit_every_level(&logger);
    registry.shutdown_all();

    assert_eq!(levels(&handle), ["ERROR", "CRITICAL"]);
}

#[test]
fn test_sink_minimum_applies_after_pipeline_threshold() {
    let registry = PipelineRegistry::new();
    let (logger, handle) = configure(&registry, base("sinky", Environment::Dev), Level::WARNING);
    emit_every_level(&logger);
    registry.shutdown_all();

    assert_eq!(levels(&handle), ["WARNING", "ERROR", "CRITICAL"]);
}

#[test]
fn test_trace_position_is_configurable() {
    let registry = PipelineRegistry::new();
    let options = LoggingOptions {
        level: Some(Level::WARNING),
        trace_level_value: 35,
        ..base("high-trace", Environment::Other)
    };
    let (logger, handle) = configure(&registry, options, Level::DEBUG);
    assert_eq!(logger.trace_level().value(), 35);
    emit_every_level(&logger);
    registry.shutdown_all();

    assert_eq!(levels(&handle), ["TRACE", "WARNING", "ERROR", "CRITICAL"]);
    assert_eq!(handle.events()[0].level.value(), 35);
}

#[test]
fn test_trace_value_colliding_with_builtin_rejected() {
    let registry = PipelineRegistry::new();
    let options = LoggingOptions {
        trace_level_value: 30,
        ..base("collide", Environment::Other)
    };
    assert!(registry.configure(&options).is_err());
    assert_eq!(registry.running_workers(), 0);
}
