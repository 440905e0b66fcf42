use rask_log_pipeline::format::TextFormatter;
use rask_log_pipeline::pipeline::external;
use rask_log_pipeline::sink::{MemoryHandle, MemorySink};
use rask_log_pipeline::{
    ExternalLoggerMode, FieldValue, Level, Logger, LoggingOptions, PipelineRegistry,
};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

fn configure(registry: &PipelineRegistry, mode: ExternalLoggerMode) -> (Logger, MemoryHandle) {
    let sink = MemorySink::new(Arc::new(TextFormatter), Level::DEBUG);
    let handle = sink.handle();
    let options = LoggingOptions {
        console_output: false,
        external_logger_mode: mode,
        external_level: Level::WARNING,
        poll_interval_ms: 10,
        ..LoggingOptions::new("app")
    };
    let logger = registry
        .configure_with_sinks(&options, vec![Box::new(sink)])
        .unwrap();
    (logger, handle)
}

#[test]
#[serial]
fn test_capture_forwards_third_party_events() {
    let registry = PipelineRegistry::new();
    let (_logger, handle) = configure(&registry, ExternalLoggerMode::Capture);
    assert_eq!(external::active_mode(), Some(ExternalLoggerMode::Capture));

    tracing::warn!(target: "hyper::client", retries = 3, "upstream slow");
    assert!(handle.wait_for(1, Duration::from_secs(2)));
    registry.shutdown("app");

    let events = handle.events();
    assert_eq!(events.len(), 1);
    assert_eq!(&*events[0].logger, "hyper::client");
    assert_eq!(events[0].level, Level::WARNING);
    assert_eq!(events[0].message, "upstream slow");
    assert_eq!(events[0].extras.get("retries"), Some(&FieldValue::I64(3)));
}

#[test]
#[serial]
fn test_capture_respects_external_level() {
    let registry = PipelineRegistry::new();
    let (_logger, handle) = configure(&registry, ExternalLoggerMode::Capture);

    tracing::info!(target: "sqlx::query", "chatty");
    tracing::error!(target: "sqlx::query", "pool exhausted");
    registry.shutdown("app");

    let messages: Vec<String> = handle.events().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, ["pool exhausted"]);
}

#[test]
#[serial]
fn test_silence_drops_third_party_events() {
    let registry = PipelineRegistry::new();
    let (logger, handle) = configure(&registry, ExternalLoggerMode::Silence);
    assert_eq!(external::active_mode(), Some(ExternalLoggerMode::Silence));

    tracing::error!(target: "hyper::client", "should vanish");
    logger.warning("own event");
    registry.shutdown("app");

    let messages: Vec<String> = handle.events().into_iter().map(|e| e.message).collect();
    assert_eq!(messages, ["own event"]);
}

#[test]
#[serial]
fn test_shutdown_releases_policy() {
    let registry = PipelineRegistry::new();
    let (_logger, _handle) = configure(&registry, ExternalLoggerMode::Capture);
    registry.shutdown("app");
    assert_eq!(external::active_mode(), None);
}

#[test]
#[serial]
fn test_auto_resolves_by_profile() {
    let registry = PipelineRegistry::new();
    let (_logger, _handle) = configure(&registry, ExternalLoggerMode::Auto);
    assert_eq!(external::active_mode(), Some(ExternalLoggerMode::Silence));
    registry.shutdown("app");
}
