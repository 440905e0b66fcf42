//! Output destinations driven by a delivery worker.

mod console;
mod file;
mod memory;
mod webhook;

pub use console::ConsoleSink;
pub use file::{RotatingFileSink, resolve_log_path};
pub use memory::{MemoryHandle, MemorySink};
pub use webhook::{WebhookConfig, WebhookMonitor, WebhookSink};

use crate::domain::{Level, LogEvent};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sink is closed")]
    Closed,
    #[error("HTTP error: {0}")]
    Http(String),
}

/// A destination for formatted events.
///
/// A sink is owned by exactly one delivery worker thread, which calls
/// [`emit`](Sink::emit) for every event at or above [`min_level`](Sink::min_level)
/// and [`close`](Sink::close) once at shutdown. Errors and panics are caught
/// per event by the worker and never reach the caller that logged.
pub trait Sink: Send {
    fn name(&self) -> &str;

    fn min_level(&self) -> Level;

    fn emit(&mut self, event: &LogEvent) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.flush()
    }
}

pub type BoxedSink = Box<dyn Sink>;
