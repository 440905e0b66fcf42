//! Rendering of [`LogEvent`]s into the bytes a sink writes.

mod json;
mod text;

pub use json::{JsonFormatter, MAX_SERIALIZE_DEPTH, RESERVED_KEYS, TRUNCATION_MARKER};
pub use text::TextFormatter;

use crate::domain::LogEvent;
use std::sync::Arc;

/// Turns one event into one line of output, without the trailing newline.
///
/// Formatting never fails: values that cannot be rendered degrade to a
/// placeholder instead.
pub trait EventFormatter: Send + Sync {
    fn format(&self, event: &LogEvent) -> String;
}

pub type SharedFormatter = Arc<dyn EventFormatter>;

impl<F: EventFormatter + ?Sized> EventFormatter for Arc<F> {
    fn format(&self, event: &LogEvent) -> String {
        (**self).format(event)
    }
}
