use super::EventFormatter;
use crate::domain::LogEvent;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Human-readable single-line format:
/// `2024-03-01 12:30:45,123 - app.db - INFO [cid=abc] - message src/db.rs:42`.
/// Exception text follows on its own lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFormatter;

impl EventFormatter for TextFormatter {
    fn format(&self, event: &LogEvent) -> String {
        let mut line = format!(
            "{} - {} - {} [cid={}] - {} {}:{}",
            event.timestamp.format(TIMESTAMP_FORMAT),
            event.logger,
            event.level,
            event.correlation_id,
            event.rendered_message(),
            event.location.file,
            event.location.line,
        );
        if let Some(exception) = &event.exception {
            line.push('\n');
            line.push_str(exception);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Level;
    use crate::domain::event::test_support::sample_event;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_text_line_layout() {
        let mut event = sample_event(Level::TRACE, "cache warm");
        event.timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
            + chrono::Duration::milliseconds(7);
        event.correlation_id = "req-9".to_string();

        assert_eq!(
            TextFormatter.format(&event),
            "2024-03-01 12:30:45,007 - app.test - TRACE [cid=req-9] - cache warm src/handler.rs:42"
        );
    }

    #[test]
    fn test_exception_on_following_lines() {
        let mut event = sample_event(Level::ERROR, "failed");
        event.exception = Some("io error\n\nCaused by:\n    0: denied".to_string());
        let text = TextFormatter.format(&event);
        let mut lines = text.lines();
        assert!(lines.next().unwrap().ends_with("failed src/handler.rs:42"));
        assert_eq!(lines.next(), Some("io error"));
    }
}
