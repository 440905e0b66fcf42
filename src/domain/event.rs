use super::level::Level;
use super::value::{FieldValue, Fields};
use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::sync::Arc;

/// Correlation id recorded when no scope is active.
pub const NO_CORRELATION_ID: &str = "-";

/// Where in the source an event was emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Cow<'static, str>,
    pub line: u32,
    pub function: Option<Cow<'static, str>>,
}

impl SourceLocation {
    pub fn new(file: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            function: None,
        }
    }

    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self::new(location.file(), location.line())
    }

    pub fn function_name(&self) -> &str {
        self.function.as_deref().unwrap_or("-")
    }
}

/// Process and thread identity captured on the emitting thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeIdentity {
    pub process_name: Arc<str>,
    pub pid: u32,
    pub thread_name: Option<String>,
    pub thread_id: String,
    pub hostname: Arc<str>,
}

/// A fully enriched log event, ready for formatting and delivery.
///
/// Built on the caller's thread by the enricher, then moved through the queue
/// and handed by reference to each sink. Nothing mutates it after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger: Arc<str>,
    pub message: String,
    pub args: Vec<FieldValue>,
    pub extras: Fields,
    pub exception: Option<String>,
    pub location: SourceLocation,
    pub correlation_id: String,
    pub runtime: RuntimeIdentity,
}

impl LogEvent {
    /// Message with positional args substituted for `{}` placeholders in order.
    /// Surplus args are appended; surplus placeholders stay literal.
    pub fn rendered_message(&self) -> Cow<'_, str> {
        if self.args.is_empty() {
            return Cow::Borrowed(&self.message);
        }

        let mut out = String::with_capacity(self.message.len() + self.args.len() * 8);
        let mut args = self.args.iter();
        let mut rest = self.message.as_str();
        while let Some(pos) = rest.find("{}") {
            let Some(arg) = args.next() else {
                break;
            };
            out.push_str(&rest[..pos]);
            out.push_str(&arg.to_string());
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);

        let surplus: Vec<String> = args.map(ToString::to_string).collect();
        if !surplus.is_empty() {
            out.push_str(" ");
            out.push_str(&surplus.join(" "));
        }
        Cow::Owned(out)
    }
}

/// Renders an error and its `source()` chain the way a traceback reads:
/// outermost error first, each cause on its own line.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    let mut index = 0;
    if source.is_some() {
        out.push_str("\n\nCaused by:");
    }
    while let Some(cause) = source {
        out.push_str(&format!("\n    {index}: {cause}"));
        index += 1;
        source = cause.source();
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn sample_event(level: Level, message: &str) -> LogEvent {
        LogEvent {
            timestamp: Utc::now(),
            level,
            logger: Arc::from("app.test"),
            message: message.to_string(),
            args: Vec::new(),
            extras: Fields::new(),
            exception: None,
            location: SourceLocation::new("src/handler.rs", 42),
            correlation_id: NO_CORRELATION_ID.to_string(),
            runtime: RuntimeIdentity {
                process_name: Arc::from("rask"),
                pid: 4242,
                thread_name: Some("main".to_string()),
                thread_id: "1".to_string(),
                hostname: Arc::from("host-a"),
            },
        }
    }
}
