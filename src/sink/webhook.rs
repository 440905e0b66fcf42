use super::{Sink, SinkError};
use crate::buffer::{BufferError, DroppingProducer, QueueConsumer, QueueMetrics, channel};
use crate::diagnostic;
use crate::domain::{Level, LogEvent};
use crate::format::{EventFormatter, JsonFormatter};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

const STOP_MARKER_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout: Duration,
    pub min_level: Level,
    pub queue_capacity: usize,
    /// How long `close` waits for queued deliveries to finish.
    pub drain_timeout: Duration,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(5),
            min_level: Level::ERROR,
            queue_capacity: crate::config::DEFAULT_WEBHOOK_QUEUE_CAPACITY,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

/// Observes a [`WebhookSink`]'s delivery thread after the sink has moved
/// into a pipeline.
#[derive(Debug, Clone)]
pub struct WebhookMonitor {
    running: Arc<AtomicBool>,
}

impl WebhookMonitor {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Cleared when the delivery thread exits, however it exits.
struct RunningMarker(Arc<AtomicBool>);

impl Drop for RunningMarker {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Delivery {
    Payload(String),
    Stop,
}

/// POSTs every event as a JSON document to a URL.
///
/// Requests are made by a dedicated thread fed through its own bounded
/// queue, so a slow or unreachable endpoint only ever costs the delivery
/// worker one non-blocking enqueue.
pub struct WebhookSink {
    producer: DroppingProducer<Delivery>,
    stop: Arc<AtomicBool>,
    done: crossbeam_channel::Receiver<()>,
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    formatter: JsonFormatter,
    min_level: Level,
    drain_timeout: Duration,
}

impl WebhookSink {
    pub fn new(config: WebhookConfig, formatter: JsonFormatter) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Http(format!("Failed to create HTTP client: {e}")))?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (producer, consumer) = channel(config.queue_capacity, "Webhook queue full");
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = crossbeam_channel::bounded(1);

        let worker_stop = Arc::clone(&stop);
        let running = Arc::new(AtomicBool::new(true));
        let marker = RunningMarker(Arc::clone(&running));
        let url = config.url.clone();
        let handle = std::thread::Builder::new()
            .name("webhook-log-worker".to_string())
            .spawn(move || {
                let _marker = marker;
                deliver_loop(&runtime, &client, &url, &consumer, &worker_stop);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            producer,
            stop,
            done,
            handle: Some(handle),
            running,
            formatter,
            min_level: config.min_level,
            drain_timeout: config.drain_timeout,
        })
    }

    pub fn metrics(&self) -> QueueMetrics {
        self.producer.metrics()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn monitor(&self) -> WebhookMonitor {
        WebhookMonitor {
            running: Arc::clone(&self.running),
        }
    }
}

fn deliver_loop(
    runtime: &tokio::runtime::Runtime,
    client: &Client,
    url: &str,
    consumer: &QueueConsumer<Delivery>,
    stop: &AtomicBool,
) {
    loop {
        let delivery = match consumer.recv_timeout(POLL_INTERVAL) {
            Ok(Some(delivery)) => delivery,
            Ok(None) if stop.load(Ordering::Acquire) => break,
            Ok(None) => continue,
            Err(_) => break,
        };

        let Delivery::Payload(body) = delivery else {
            break;
        };

        match runtime.block_on(post(client, url, body)) {
            Ok(()) => consumer.mark_delivered(),
            Err(e) => diagnostic!("{e}"),
        }
    }
}

async fn post(client: &Client, url: &str, body: String) -> Result<(), SinkError> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| SinkError::Http(format!("Webhook send failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SinkError::Http(format!("Webhook returned HTTP {status}")));
    }
    Ok(())
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field("min_level", &self.min_level)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Sink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn emit(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        if self.handle.is_none() {
            return Err(SinkError::Closed);
        }
        let body = self.formatter.format(event);
        match self.producer.enqueue(Delivery::Payload(body)) {
            // Counted and reported by the queue
            Ok(()) | Err(BufferError::Full) => Ok(()),
            Err(_) => Err(SinkError::Closed),
        }
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.stop.store(true, Ordering::Release);
        if let Err(e) = self.producer.send_timeout(Delivery::Stop, STOP_MARKER_TIMEOUT) {
            // The stop flag still ends the loop once the queue drains
            diagnostic!("Webhook stop marker not queued: {e}");
        }

        match self.done.recv_timeout(self.drain_timeout) {
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    diagnostic!("Webhook worker panicked");
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                diagnostic!(
                    "Webhook worker did not finish within {}ms; detaching",
                    self.drain_timeout.as_millis()
                );
            }
        }
        Ok(())
    }
}

impl Drop for WebhookSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
