pub mod queue;

pub use queue::{DroppingProducer, QueueConsumer, QueueMetrics, channel};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Buffer is full")]
    Full,
    #[error("Buffer is closed")]
    Closed,
    #[error("Send timed out after {timeout_ms}ms")]
    SendTimeout { timeout_ms: u64 },
}
