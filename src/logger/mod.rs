//! Named logger handles and the per-call event builder.

pub mod enricher;

pub use enricher::EventDraft;

use crate::diagnostics;
use crate::domain::{FieldValue, Fields, Level, SourceLocation, format_error_chain};
use crate::format::{EventFormatter, TextFormatter};
use crate::pipeline::route::SharedRoutes;
use std::error::Error;
use std::sync::Arc;

/// Events below this level are discarded when no pipeline owns the logger.
pub const LAST_RESORT_LEVEL: Level = Level::WARNING;

/// Cheap, cloneable handle for emitting events under a dotted name.
///
/// Every call resolves the pipeline registered for the longest matching name
/// prefix, so a handle obtained before `configure` starts delivering as soon
/// as a pipeline exists, and falls back to stderr for WARNING and above when
/// none does. No method returns an error or blocks on I/O.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    routes: SharedRoutes,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("name", &self.name).finish()
    }
}

impl Logger {
    pub(crate) fn new(name: &str, routes: SharedRoutes) -> Self {
        Self {
            name: Arc::from(name),
            routes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logger for `name.suffix`, routed like any other descendant name.
    pub fn child(&self, suffix: &str) -> Logger {
        Logger::new(&format!("{}.{suffix}", self.name), Arc::clone(&self.routes))
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        match self.routes.read().lookup(&self.name) {
            Some(route) => level >= route.threshold,
            None => level >= LAST_RESORT_LEVEL,
        }
    }

    /// The TRACE level as positioned by the owning pipeline.
    pub fn trace_level(&self) -> Level {
        self.routes
            .read()
            .lookup(&self.name)
            .map_or(Level::TRACE, |route| route.trace_level)
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::DEBUG, message, Fields::new());
    }

    #[track_caller]
    pub fn debug_with(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        self.log(Level::DEBUG, message, fields);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::INFO, message, Fields::new());
    }

    #[track_caller]
    pub fn info_with(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        self.log(Level::INFO, message, fields);
    }

    /// High-visibility trace point; sits between INFO and WARNING by default
    /// so it survives a production threshold of TRACE.
    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) {
        self.log(self.trace_level(), message, Fields::new());
    }

    #[track_caller]
    pub fn trace_with(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        self.log(self.trace_level(), message, fields);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.log(Level::WARNING, message, Fields::new());
    }

    #[track_caller]
    pub fn warning_with(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        self.log(Level::WARNING, message, fields);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::ERROR, message, Fields::new());
    }

    #[track_caller]
    pub fn error_with(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        self.log(Level::ERROR, message, fields);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.log(Level::CRITICAL, message, Fields::new());
    }

    #[track_caller]
    pub fn critical_with(&self, message: impl Into<String>, fields: impl Into<Fields>) {
        self.log(Level::CRITICAL, message, fields);
    }

    /// ERROR event carrying `error` and its source chain as exception text.
    #[track_caller]
    pub fn exception(&self, message: impl Into<String>, error: &(dyn Error + 'static)) {
        self.exception_with(message, error, Fields::new());
    }

    #[track_caller]
    pub fn exception_with(
        &self,
        message: impl Into<String>,
        error: &(dyn Error + 'static),
        fields: impl Into<Fields>,
    ) {
        if !self.is_enabled_for(Level::ERROR) {
            return;
        }
        let mut draft = self.draft(Level::ERROR, message.into(), SourceLocation::caller());
        draft.extras = fields.into();
        draft.exception = Some(format_error_chain(error));
        self.submit(draft);
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, fields: impl Into<Fields>) {
        if !self.is_enabled_for(level) {
            return;
        }
        let mut draft = self.draft(level, message.into(), SourceLocation::caller());
        draft.extras = fields.into();
        self.submit(draft);
    }

    /// Starts an event with positional args, a function name, an error or a
    /// correlation id override. Nothing is sent until [`EventBuilder::emit`].
    #[track_caller]
    pub fn event(&self, level: Level, message: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            logger: self,
            draft: self.draft(level, message.into(), SourceLocation::caller()),
        }
    }

    fn draft(&self, level: Level, message: String, location: SourceLocation) -> EventDraft {
        EventDraft::new(level, Arc::clone(&self.name), message, location)
    }

    fn submit(&self, draft: EventDraft) {
        let route = self.routes.read().lookup(&self.name).cloned();
        match route {
            Some(route) => {
                if draft.level < route.threshold {
                    return;
                }
                // A full queue has already counted and reported the drop
                let _ = route.producer.enqueue(draft.enrich());
            }
            None => {
                if draft.level < LAST_RESORT_LEVEL {
                    return;
                }
                let mut line = TextFormatter.format(&draft.enrich());
                line.push('\n');
                diagnostics::write_raw(line.as_bytes());
            }
        }
    }
}

/// Event under construction; see [`Logger::event`].
#[must_use = "call `emit` to send the event"]
pub struct EventBuilder<'a> {
    logger: &'a Logger,
    draft: EventDraft,
}

impl EventBuilder<'_> {
    /// Positional value substituted for the next `{}` in the message.
    pub fn arg(mut self, value: impl Into<FieldValue>) -> Self {
        self.draft.args.push(value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.draft.extras.insert(key, value);
        self
    }

    pub fn fields(mut self, fields: impl Into<Fields>) -> Self {
        self.draft.extras.extend(fields.into());
        self
    }

    pub fn function(mut self, name: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        self.draft.location.function = Some(name.into());
        self
    }

    pub fn error(mut self, error: &(dyn Error + 'static)) -> Self {
        self.draft.exception = Some(format_error_chain(error));
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.draft.correlation_id = Some(id.into());
        self
    }

    pub fn emit(self) {
        self.logger.submit(self.draft);
    }
}
