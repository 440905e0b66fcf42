use super::{Sink, SinkError};
use crate::domain::{Level, LogEvent};
use crate::format::SharedFormatter;
use std::io::Write;

/// Writes one formatted line per event to stderr, or to any injected writer.
pub struct ConsoleSink {
    writer: Box<dyn Write + Send>,
    formatter: SharedFormatter,
    min_level: Level,
}

impl ConsoleSink {
    pub fn stderr(formatter: SharedFormatter, min_level: Level) -> Self {
        Self::with_writer(Box::new(std::io::stderr()), formatter, min_level)
    }

    pub fn with_writer(
        writer: Box<dyn Write + Send>,
        formatter: SharedFormatter,
        min_level: Level,
    ) -> Self {
        Self {
            writer,
            formatter,
            min_level,
        }
    }
}

impl std::fmt::Debug for ConsoleSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSink")
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn emit(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        let mut line = self.formatter.format(event);
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
