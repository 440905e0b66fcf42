//! Policy for events that third-party crates emit through `tracing` (and,
//! via the `log` compatibility bridge, through `log`).
//!
//! A single process-wide subscriber layer is installed the first time a
//! pipeline asks to silence or capture external events. It consults the
//! current route on every event, so switching policy on reconfigure takes
//! effect immediately. If the application already installed its own global
//! subscriber the layer cannot be added; that is reported once and the
//! application's subscriber is left in charge.

use crate::buffer::DroppingProducer;
use crate::config::ExternalLoggerMode;
use crate::diagnostic;
use crate::domain::{FieldValue, Fields, Level, LogEvent, SourceLocation};
use crate::logger::EventDraft;
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// Identifies which pipeline installed the current route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOwner {
    pub registry: u64,
    pub logger: String,
}

#[derive(Debug, Clone)]
enum ExternalRoute {
    Silence {
        owner: RouteOwner,
    },
    Capture {
        owner: RouteOwner,
        producer: DroppingProducer<LogEvent>,
        threshold: Level,
    },
}

impl ExternalRoute {
    fn owner(&self) -> &RouteOwner {
        match self {
            ExternalRoute::Silence { owner } | ExternalRoute::Capture { owner, .. } => owner,
        }
    }
}

static ROUTE: RwLock<Option<ExternalRoute>> = parking_lot::const_rwlock(None);
static BRIDGE: OnceLock<bool> = OnceLock::new();

/// Installs the bridge layer once. Returns whether it is active.
fn install_bridge() -> bool {
    *BRIDGE.get_or_init(|| {
        let installed = tracing_subscriber::registry()
            .with(ExternalBridge)
            .try_init()
            .is_ok();
        if !installed {
            diagnostic!(
                "A global tracing subscriber is already installed; external logger policy not applied"
            );
        }
        installed
    })
}

/// Applies `mode` on behalf of `owner`. `Auto` must already be resolved;
/// an unresolved one is treated as silence.
pub fn apply(
    mode: ExternalLoggerMode,
    owner: RouteOwner,
    producer: &DroppingProducer<LogEvent>,
    threshold: Level,
) {
    let route = match mode {
        ExternalLoggerMode::LeaveAlone => {
            release(&owner);
            return;
        }
        ExternalLoggerMode::Capture => ExternalRoute::Capture {
            owner,
            producer: producer.clone(),
            threshold,
        },
        ExternalLoggerMode::Silence | ExternalLoggerMode::Auto => ExternalRoute::Silence { owner },
    };

    if install_bridge() {
        *ROUTE.write() = Some(route);
    }
}

/// Drops the route if `owner` installed it. Events then go nowhere until
/// another pipeline applies a policy.
pub fn release(owner: &RouteOwner) {
    let mut route = ROUTE.write();
    if route.as_ref().is_some_and(|r| r.owner() == owner) {
        *route = None;
    }
}

/// The policy currently in force, if any pipeline set one.
pub fn active_mode() -> Option<ExternalLoggerMode> {
    ROUTE.read().as_ref().map(|route| match route {
        ExternalRoute::Silence { .. } => ExternalLoggerMode::Silence,
        ExternalRoute::Capture { .. } => ExternalLoggerMode::Capture,
    })
}

pub fn level_from_tracing(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::ERROR,
        tracing::Level::WARN => Level::WARNING,
        tracing::Level::INFO => Level::INFO,
        _ => Level::DEBUG,
    }
}

fn is_own_target(target: &str) -> bool {
    target.starts_with(OWN_TARGET)
}

struct ExternalBridge;

impl<S: Subscriber> Layer<S> for ExternalBridge {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // Policy can change at runtime; never let a callsite cache the answer
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        if is_own_target(metadata.target()) {
            return false;
        }
        match &*ROUTE.read() {
            Some(ExternalRoute::Capture { threshold, .. }) => {
                level_from_tracing(metadata.level()) >= *threshold
            }
            _ => false,
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let route = ROUTE.read().clone();
        let Some(ExternalRoute::Capture {
            producer,
            threshold,
            ..
        }) = route
        else {
            return;
        };

        let metadata = event.metadata();
        let level = level_from_tracing(metadata.level());
        if level < threshold {
            return;
        }

        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        let target = visitor.log_target.take().unwrap_or_else(|| metadata.target().to_string());
        if is_own_target(&target) {
            return;
        }

        let file = visitor
            .log_file
            .take()
            .or_else(|| metadata.file().map(str::to_string))
            .unwrap_or_else(|| "-".to_string());
        let line = visitor.log_line.or(metadata.line()).unwrap_or(0);
        let mut location = SourceLocation::new(file, line);
        location.function = visitor
            .log_module_path
            .take()
            .or_else(|| metadata.module_path().map(str::to_string))
            .map(Into::into);

        let mut draft = EventDraft::new(
            level,
            Arc::from(target),
            visitor.message.take().unwrap_or_default(),
            location,
        );
        draft.extras = std::mem::take(&mut visitor.fields);
        let _ = producer.enqueue(draft.enrich());
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Fields,
    log_target: Option<String>,
    log_module_path: Option<String>,
    log_file: Option<String>,
    log_line: Option<u32>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: FieldValue) {
        self.fields.insert(field.name(), value);
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "log.target" => self.log_target = Some(value.to_string()),
            "log.module_path" => self.log_module_path = Some(value.to_string()),
            "log.file" => self.log_file = Some(value.to_string()),
            name if name.starts_with("log.") => {}
            _ => self.put(field, FieldValue::from(value)),
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "log.line" => self.log_line = u32::try_from(value).ok(),
            name if name.starts_with("log.") => {}
            _ => self.put(field, FieldValue::from(value)),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if !field.name().starts_with("log.") {
            self.put(field, FieldValue::from(value));
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, FieldValue::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, FieldValue::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, FieldValue::display(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{value:?}")),
            name if name.starts_with("log.") => {}
            _ => self.put(field, FieldValue::debug(value)),
        }
    }
}
