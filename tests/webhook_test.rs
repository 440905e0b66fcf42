use rask_log_pipeline::format::JsonFormatter;
use rask_log_pipeline::sink::{WebhookConfig, WebhookSink};
use rask_log_pipeline::{ExternalLoggerMode, Level, LoggingOptions, PipelineRegistry, fields};
use serde_json::Value;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn webhook_options(name: &str, url: String) -> LoggingOptions {
    LoggingOptions {
        console_output: false,
        external_logger_mode: ExternalLoggerMode::LeaveAlone,
        webhook_url: Some(url),
        webhook_timeout_ms: 2_000,
        poll_interval_ms: 10,
        ..LoggingOptions::new(name)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_events_posted_as_json() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let options = webhook_options("alerts", format!("{}/hook", mock_server.uri()));
    tokio::task::spawn_blocking(move || {
        let registry = PipelineRegistry::new();
        let logger = registry.configure(&options).unwrap();
        logger.info("below the webhook level");
        logger.error_with("payment declined", fields! { "order_id" => 7 });
        registry.shutdown("alerts");
    })
    .await
    .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["level"], "ERROR");
    assert_eq!(body["logger"], "alerts");
    assert_eq!(body["message"], "payment declined");
    assert_eq!(body["order_id"], 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_errors_do_not_stop_delivery() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let options = webhook_options("flaky", format!("{}/hook", mock_server.uri()));
    tokio::task::spawn_blocking(move || {
        let registry = PipelineRegistry::new();
        let logger = registry.configure(&options).unwrap();
        for i in 0..3 {
            logger.critical(format!("outage {i}"));
        }
        registry.shutdown("flaky");
    })
    .await
    .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unreachable_endpoint_does_not_block_shutdown() {
    // Nothing listens on this port once the server is dropped
    let url = {
        let server = MockServer::start().await;
        format!("{}/hook", server.uri())
    };

    let elapsed = tokio::task::spawn_blocking(move || {
        let mut config = WebhookConfig::new(url);
        config.timeout = Duration::from_millis(300);
        config.drain_timeout = Duration::from_secs(5);
        let sink = WebhookSink::new(config, JsonFormatter::default()).unwrap();

        let registry = PipelineRegistry::new();
        let options = LoggingOptions {
            console_output: false,
            external_logger_mode: ExternalLoggerMode::LeaveAlone,
            poll_interval_ms: 10,
            ..LoggingOptions::new("offline")
        };
        let logger = registry
            .configure_with_sinks(&options, vec![Box::new(sink)])
            .unwrap();

        let started = std::time::Instant::now();
        for i in 0..5 {
            logger.error(format!("nobody home {i}"));
        }
        registry.shutdown("offline");
        started.elapsed()
    })
    .await
    .unwrap();

    assert!(elapsed < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_joins_webhook_thread() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/hook", mock_server.uri());
    let (running_before, running_after) = tokio::task::spawn_blocking(move || {
        let sink = WebhookSink::new(WebhookConfig::new(url), JsonFormatter::default()).unwrap();
        let monitor = sink.monitor();

        let registry = PipelineRegistry::new();
        let options = LoggingOptions {
            console_output: false,
            external_logger_mode: ExternalLoggerMode::LeaveAlone,
            poll_interval_ms: 10,
            ..LoggingOptions::new("joined")
        };
        let logger = registry
            .configure_with_sinks(&options, vec![Box::new(sink)])
            .unwrap();
        logger.error("delivered before exit");
        let running_before = monitor.is_running();

        registry.shutdown("joined");
        assert_eq!(registry.running_workers(), 0);
        (running_before, monitor.is_running())
    })
    .await
    .unwrap();

    assert!(running_before);
    assert!(!running_after);
}

#[test]
fn test_webhook_sink_level_defaults_to_error() {
    let config = WebhookConfig::new("http://127.0.0.1:9/hook");
    assert_eq!(config.min_level, Level::ERROR);
}
