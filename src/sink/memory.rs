use super::{Sink, SinkError};
use crate::domain::{Level, LogEvent};
use crate::format::SharedFormatter;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct Captured {
    lines: Mutex<Vec<String>>,
    events: Mutex<Vec<LogEvent>>,
    closed: AtomicBool,
}

/// Keeps every formatted line in memory. Read it back through a
/// [`MemoryHandle`], which stays valid after the sink moves into a worker.
pub struct MemorySink {
    captured: Arc<Captured>,
    formatter: SharedFormatter,
    min_level: Level,
}

/// Read side of a [`MemorySink`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    captured: Arc<Captured>,
}

impl MemorySink {
    pub fn new(formatter: SharedFormatter, min_level: Level) -> Self {
        Self {
            captured: Arc::new(Captured::default()),
            formatter,
            min_level,
        }
    }

    pub fn handle(&self) -> MemoryHandle {
        MemoryHandle {
            captured: Arc::clone(&self.captured),
        }
    }
}

impl MemoryHandle {
    pub fn lines(&self) -> Vec<String> {
        self.captured.lines.lock().clone()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.captured.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.captured.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.captured.closed.load(Ordering::Acquire)
    }

    /// Polls until `count` lines arrived or `timeout` passed.
    pub fn wait_for(&self, count: usize, timeout: std::time::Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while std::time::Instant::now() < deadline {
            if self.len() >= count {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        self.len() >= count
    }
}

impl Sink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn min_level(&self) -> Level {
        self.min_level
    }

    fn emit(&mut self, event: &LogEvent) -> Result<(), SinkError> {
        if self.captured.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }
        let line = self.formatter.format(event);
        self.captured.lines.lock().push(line);
        self.captured.events.lock().push(event.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.captured.closed.store(true, Ordering::Release);
        Ok(())
    }
}
