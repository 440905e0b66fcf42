//! Builds [`LogEvent`]s on the caller's thread: timestamp, correlation id
//! and runtime identity are all captured before the event leaves it.

use crate::correlation;
use crate::domain::{
    FieldValue, Fields, Level, LogEvent, NO_CORRELATION_ID, RuntimeIdentity, SourceLocation,
};
use chrono::Utc;
use std::sync::{Arc, OnceLock};

struct ProcessIdentity {
    process_name: Arc<str>,
    pid: u32,
    hostname: Arc<str>,
}

fn process_identity() -> &'static ProcessIdentity {
    static IDENTITY: OnceLock<ProcessIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| ProcessIdentity {
        process_name: Arc::from(detect_process_name()),
        pid: std::process::id(),
        hostname: Arc::from(hostname()),
    })
}

fn detect_process_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .or_else(|| std::env::args().next())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Machine hostname, resolved once per process.
pub fn hostname() -> String {
    static HOSTNAME: OnceLock<String> = OnceLock::new();
    HOSTNAME
        .get_or_init(|| {
            hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string())
        })
        .clone()
}

/// Identity of the current process and thread.
pub fn runtime_identity() -> RuntimeIdentity {
    let identity = process_identity();
    let thread = std::thread::current();
    RuntimeIdentity {
        process_name: Arc::clone(&identity.process_name),
        pid: identity.pid,
        thread_name: thread.name().map(str::to_string),
        thread_id: thread_id_number(thread.id()),
        hostname: Arc::clone(&identity.hostname),
    }
}

// `ThreadId` only exposes its number through Debug: "ThreadId(7)".
fn thread_id_number(id: std::thread::ThreadId) -> String {
    let debug = format!("{id:?}");
    debug
        .strip_prefix("ThreadId(")
        .and_then(|rest| rest.strip_suffix(')'))
        .map_or(debug.clone(), str::to_string)
}

/// Parts of an event supplied by the logging call.
#[derive(Debug)]
pub struct EventDraft {
    pub level: Level,
    pub logger: Arc<str>,
    pub message: String,
    pub args: Vec<FieldValue>,
    pub extras: Fields,
    pub exception: Option<String>,
    pub location: SourceLocation,
    /// Overrides the scoped correlation id for this one event.
    pub correlation_id: Option<String>,
}

impl EventDraft {
    pub fn new(level: Level, logger: Arc<str>, message: String, location: SourceLocation) -> Self {
        Self {
            level,
            logger,
            message,
            args: Vec::new(),
            extras: Fields::new(),
            exception: None,
            location,
            correlation_id: None,
        }
    }

    /// Completes the draft with the current time, correlation id and
    /// runtime identity.
    pub fn enrich(self) -> LogEvent {
        let correlation_id = self
            .correlation_id
            .or_else(correlation::current)
            .unwrap_or_else(|| NO_CORRELATION_ID.to_string());

        LogEvent {
            timestamp: Utc::now(),
            level: self.level,
            logger: self.logger,
            message: self.message,
            args: self.args,
            extras: self.extras,
            exception: self.exception,
            location: self.location,
            correlation_id,
            runtime: runtime_identity(),
        }
    }
}
