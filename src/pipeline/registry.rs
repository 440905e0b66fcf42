use super::external::{self, RouteOwner};
use super::route::{Route, RouteTable, SharedRoutes};
use super::worker::DeliveryWorker;
use crate::buffer::{DroppingProducer, QueueMetrics, channel};
use crate::config::{EffectiveSettings, LoggingOptions};
use crate::domain::{LogEvent, PipelineError};
use crate::format::{JsonFormatter, SharedFormatter, TextFormatter};
use crate::logger::Logger;
use crate::logger::enricher::hostname;
use crate::sink::{
    BoxedSink, ConsoleSink, RotatingFileSink, WebhookConfig, WebhookSink, resolve_log_path,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// A running pipeline: its queue's sending half and the worker draining it.
struct Pipeline {
    name: String,
    producer: DroppingProducer<LogEvent>,
    worker: DeliveryWorker,
    owner: RouteOwner,
}

struct RegistryInner {
    id: u64,
    pipelines: Mutex<HashMap<String, Pipeline>>,
    routes: SharedRoutes,
    live_workers: Arc<AtomicUsize>,
    guard_issued: AtomicBool,
}

/// Owns every pipeline configured through it.
///
/// Each logger name has at most one running pipeline. Configuring a name
/// again stops and closes the previous pipeline before the new one starts.
/// `configure` and `shutdown` are serialized by an internal mutex; logging
/// calls only take a read lock on the route table. Dropping the registry
/// stops everything it still owns.
pub struct PipelineRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("id", &self.inner.id)
            .field("pipelines", &self.names())
            .field("running_workers", &self.running_workers())
            .finish()
    }
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
                pipelines: Mutex::new(HashMap::new()),
                routes: Arc::new(RwLock::new(RouteTable::default())),
                live_workers: Arc::new(AtomicUsize::new(0)),
                guard_issued: AtomicBool::new(false),
            }),
        }
    }

    /// Validates `options`, replaces any pipeline registered under
    /// `options.logger_name`, starts the new one and applies the external
    /// logger policy.
    pub fn configure(&self, options: &LoggingOptions) -> Result<Logger, PipelineError> {
        self.configure_with_sinks(options, Vec::new())
    }

    /// Like [`configure`](Self::configure), delivering to `extra_sinks` in
    /// addition to the sinks `options` describes.
    pub fn configure_with_sinks(
        &self,
        options: &LoggingOptions,
        extra_sinks: Vec<BoxedSink>,
    ) -> Result<Logger, PipelineError> {
        options.validate()?;
        let name = options.logger_name.trim().to_string();
        let effective = options.effective();

        let mut pipelines = self.inner.pipelines.lock();
        if let Some(previous) = pipelines.remove(&name) {
            self.inner.stop_pipeline(previous);
        }

        let mut sinks = build_sinks(options, &effective)?;
        sinks.extend(extra_sinks);

        let (producer, consumer) = channel(options.queue_capacity, "Queue full");
        let worker = DeliveryWorker::spawn(
            &name,
            consumer,
            sinks,
            options.poll_interval(),
            options.shutdown_timeout(),
            Arc::clone(&self.inner.live_workers),
        )?;

        self.inner.routes.write().insert(
            &name,
            Route {
                producer: producer.clone(),
                threshold: effective.threshold,
                trace_level: options.trace_level(),
            },
        );

        let owner = RouteOwner {
            registry: self.inner.id,
            logger: name.clone(),
        };
        external::apply(
            effective.external_mode,
            owner.clone(),
            &producer,
            options.resolve_level(options.external_level),
        );

        pipelines.insert(
            name.clone(),
            Pipeline {
                name: name.clone(),
                producer,
                worker,
                owner,
            },
        );

        Ok(Logger::new(&name, Arc::clone(&self.inner.routes)))
    }

    /// Handle for `name`. Works before `configure`; events route to whichever
    /// pipeline owns the longest prefix of `name` at the time of each call.
    pub fn get_logger(&self, name: &str) -> Logger {
        Logger::new(name, Arc::clone(&self.inner.routes))
    }

    /// Stops the pipeline registered as `name`: drains its queue, closes its
    /// sinks and joins its worker. Returns `false` when nothing was
    /// registered, so repeated calls are harmless.
    pub fn shutdown(&self, name: &str) -> bool {
        let previous = self.inner.pipelines.lock().remove(name.trim());
        match previous {
            Some(pipeline) => {
                self.inner.stop_pipeline(pipeline);
                true
            }
            None => false,
        }
    }

    pub fn shutdown_all(&self) {
        self.inner.shutdown_all();
    }

    /// The exit safety net. The first call returns a guard that stops every
    /// pipeline still registered when it is dropped; later calls return
    /// `None`.
    pub fn exit_guard(&self) -> Option<ShutdownGuard> {
        if self.inner.guard_issued.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(ShutdownGuard {
            registry: Arc::downgrade(&self.inner),
        })
    }

    pub fn is_configured(&self, name: &str) -> bool {
        self.inner.pipelines.lock().contains_key(name.trim())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.pipelines.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Delivery threads currently alive across all of this registry's pipelines.
    pub fn running_workers(&self) -> usize {
        self.inner.live_workers.load(Ordering::Acquire)
    }

    pub fn metrics(&self, name: &str) -> Option<QueueMetrics> {
        self.inner
            .pipelines
            .lock()
            .get(name.trim())
            .map(|pipeline| pipeline.producer.metrics())
    }
}

impl RegistryInner {
    fn stop_pipeline(&self, mut pipeline: Pipeline) {
        // Unroute first so no new events arrive while the worker drains
        self.routes.write().remove(&pipeline.name);
        external::release(&pipeline.owner);
        pipeline.worker.stop();
    }

    fn shutdown_all(&self) {
        let drained: Vec<Pipeline> = self.pipelines.lock().drain().map(|(_, p)| p).collect();
        for pipeline in drained {
            self.stop_pipeline(pipeline);
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.shutdown_all();
    }
}

/// Stops every pipeline of the registry that issued it when dropped.
///
/// Hold it in `main` so pipelines are drained on every way out of `main`,
/// including `?` and panics that unwind.
#[must_use = "pipelines are stopped when the guard is dropped"]
#[derive(Debug)]
pub struct ShutdownGuard {
    registry: Weak<RegistryInner>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.shutdown_all();
        }
    }
}

fn build_sinks(
    options: &LoggingOptions,
    effective: &EffectiveSettings,
) -> Result<Vec<BoxedSink>, PipelineError> {
    let formatter: SharedFormatter = if options.json_output {
        Arc::new(JsonFormatter::new(
            effective.include_runtime_fields,
            options.max_value_length,
        ))
    } else {
        Arc::new(TextFormatter)
    };

    let mut sinks: Vec<BoxedSink> = Vec::new();

    if options.console_output {
        sinks.push(Box::new(ConsoleSink::stderr(
            Arc::clone(&formatter),
            effective.threshold,
        )));
    }

    if let Some(template) = &options.log_filepath {
        let path = resolve_log_path(template, std::process::id(), &hostname());
        sinks.push(Box::new(RotatingFileSink::open(
            path,
            options.max_file_size,
            options.backup_count,
            Arc::clone(&formatter),
            effective.threshold,
        )?));
    }

    if let Some(url) = &options.webhook_url {
        let config = WebhookConfig {
            url: url.clone(),
            timeout: options.webhook_timeout(),
            min_level: options.resolve_level(options.webhook_level),
            queue_capacity: options.webhook_queue_capacity,
            drain_timeout: options.shutdown_timeout(),
        };
        let formatter = JsonFormatter::new(
            effective.include_runtime_fields,
            options.max_value_length,
        );
        sinks.push(Box::new(WebhookSink::new(config, formatter)?));
    }

    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExternalLoggerMode;
    use crate::domain::Level;
    use crate::sink::MemorySink;
    use std::time::Duration;

    fn quiet(name: &str) -> LoggingOptions {
        LoggingOptions {
            console_output: false,
            external_logger_mode: ExternalLoggerMode::LeaveAlone,
            poll_interval_ms: 10,
            ..LoggingOptions::new(name)
        }
    }

    #[test]
    fn test_configure_rejects_invalid_options() {
        let registry = PipelineRegistry::new();
        let options = LoggingOptions {
            trace_level_value: 20,
            ..quiet("app")
        };
        assert!(matches!(
            registry.configure(&options),
            Err(PipelineError::Config(_))
        ));
        assert_eq!(registry.running_workers(), 0);
    }

    #[test]
    fn test_reconfigure_closes_previous_sinks() {
        let registry = PipelineRegistry::new();
        let first = MemorySink::new(Arc::new(TextFormatter), Level::DEBUG);
        let first_handle = first.handle();
        registry
            .configure_with_sinks(&quiet("app"), vec![Box::new(first)])
            .unwrap();

        let second = MemorySink::new(Arc::new(TextFormatter), Level::DEBUG);
        let second_handle = second.handle();
        let logger = registry
            .configure_with_sinks(&quiet("app"), vec![Box::new(second)])
            .unwrap();

        assert!(first_handle.is_closed());
        assert_eq!(registry.running_workers(), 1);

        logger.info("after reconfigure");
        assert!(second_handle.wait_for(1, Duration::from_secs(2)));
        assert!(first_handle.is_empty());
    }

    #[test]
    fn test_exit_guard_issued_once_and_stops_all() {
        let registry = PipelineRegistry::new();
        registry.configure(&quiet("a")).unwrap();
        registry.configure(&quiet("b")).unwrap();
        assert_eq!(registry.running_workers(), 2);

        let guard = registry.exit_guard();
        assert!(guard.is_some());
        assert!(registry.exit_guard().is_none());

        drop(guard);
        assert_eq!(registry.running_workers(), 0);
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_drop_stops_workers() {
        let live = {
            let registry = PipelineRegistry::new();
            registry.configure(&quiet("app")).unwrap();
            Arc::clone(&registry.inner.live_workers)
        };
        assert_eq!(live.load(Ordering::Acquire), 0);
    }
}
