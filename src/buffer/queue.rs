//! Bounded multi-producer queue whose producers never wait.
//!
//! A full queue discards the new item and bumps a drop counter; the first
//! drop and every [`DROP_REPORT_INTERVAL`]th after it are reported on the
//! diagnostic stream.

use super::BufferError;
use crate::diagnostic;
use crossbeam_channel::{
    Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const DROP_REPORT_INTERVAL: u64 = 1000;

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
}

/// Point-in-time view of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueMetrics {
    /// 0 for an unbounded queue.
    pub capacity: usize,
    pub depth: usize,
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
}

/// Creates a queue holding at most `capacity` items; 0 means unbounded.
///
/// `label` prefixes the drop diagnostic, e.g. `"Queue full"`.
pub fn channel<T>(capacity: usize, label: &str) -> (DroppingProducer<T>, QueueConsumer<T>) {
    let (sender, receiver) = if capacity == 0 {
        crossbeam_channel::unbounded()
    } else {
        crossbeam_channel::bounded(capacity)
    };
    let counters = Arc::new(Counters::default());

    let producer = DroppingProducer {
        sender,
        counters: Arc::clone(&counters),
        capacity,
        label: Arc::from(label),
    };
    let consumer = QueueConsumer {
        receiver,
        counters,
        capacity,
    };
    (producer, consumer)
}

/// Sending half. Cheap to clone; all clones share one drop counter.
#[derive(Debug)]
pub struct DroppingProducer<T> {
    sender: Sender<T>,
    counters: Arc<Counters>,
    capacity: usize,
    label: Arc<str>,
}

impl<T> Clone for DroppingProducer<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            counters: Arc::clone(&self.counters),
            capacity: self.capacity,
            label: Arc::clone(&self.label),
        }
    }
}

impl<T> DroppingProducer<T> {
    /// Hands `item` to the queue without blocking.
    ///
    /// On a full queue the item is dropped and counted. Once the consumer is
    /// gone the item is discarded silently and `Closed` is returned.
    pub fn enqueue(&self, item: T) -> Result<(), BufferError> {
        match self.sender.try_send(item) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped == 1 || dropped % DROP_REPORT_INTERVAL == 0 {
                    diagnostic!("{}: {dropped} log records dropped so far", self.label);
                }
                Err(BufferError::Full)
            }
            Err(TrySendError::Disconnected(_)) => Err(BufferError::Closed),
        }
    }

    /// Waits up to `timeout` for room. Used only for control messages; the
    /// logging path always goes through [`enqueue`](Self::enqueue).
    pub fn send_timeout(&self, item: T, timeout: Duration) -> Result<(), BufferError> {
        match self.sender.send_timeout(item, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(BufferError::SendTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
            Err(SendTimeoutError::Disconnected(_)) => Err(BufferError::Closed),
        }
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> QueueMetrics {
        snapshot(&self.counters, self.capacity, self.sender.len())
    }
}

/// Receiving half, owned by exactly one worker.
#[derive(Debug)]
pub struct QueueConsumer<T> {
    receiver: Receiver<T>,
    counters: Arc<Counters>,
    capacity: usize,
}

impl<T> QueueConsumer<T> {
    /// Waits up to `timeout` for the next item. `Ok(None)` means the wait
    /// timed out; `Err(Closed)` means every producer is gone and the queue
    /// is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<T>, BufferError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(item) => Ok(Some(item)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BufferError::Closed),
        }
    }

    /// Next item if one is ready right now.
    pub fn try_recv(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn mark_delivered(&self) {
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn metrics(&self) -> QueueMetrics {
        snapshot(&self.counters, self.capacity, self.receiver.len())
    }
}

fn snapshot(counters: &Counters, capacity: usize, depth: usize) -> QueueMetrics {
    QueueMetrics {
        capacity,
        depth,
        enqueued: counters.enqueued.load(Ordering::Relaxed),
        dropped: counters.dropped.load(Ordering::Relaxed),
        delivered: counters.delivered.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (producer, consumer) = channel::<u32>(4, "Queue full");
        let start = Instant::now();
        let results: Vec<_> = (0..10).map(|i| producer.enqueue(i)).collect();
        assert!(start.elapsed() < Duration::from_secs(1));

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 4);
        assert_eq!(producer.dropped(), 6);
        assert_eq!(consumer.len(), 4);
        assert_eq!(consumer.try_recv(), Some(0));
    }

    #[test]
    fn test_zero_capacity_is_unbounded() {
        let (producer, consumer) = channel::<u32>(0, "Queue full");
        for i in 0..50_000 {
            producer.enqueue(i).unwrap();
        }
        let metrics = consumer.metrics();
        assert_eq!(metrics.capacity, 0);
        assert_eq!(metrics.depth, 50_000);
        assert_eq!(metrics.dropped, 0);
    }

    #[test]
    fn test_clones_share_counters() {
        let (producer, _consumer) = channel::<u32>(1, "Queue full");
        let other = producer.clone();
        producer.enqueue(1).unwrap();
        assert_eq!(other.enqueue(2), Err(BufferError::Full));
        assert_eq!(producer.dropped(), 1);
        assert_eq!(producer.metrics().enqueued, 1);
    }

    #[test]
    fn test_closed_after_consumer_dropped() {
        let (producer, consumer) = channel::<u32>(2, "Queue full");
        drop(consumer);
        assert_eq!(producer.enqueue(1), Err(BufferError::Closed));
        assert_eq!(producer.dropped(), 0);
    }

    #[test]
    fn test_recv_timeout_reports_idle_and_closed() {
        let (producer, consumer) = channel::<u32>(2, "Queue full");
        assert_eq!(consumer.recv_timeout(Duration::from_millis(10)), Ok(None));
        producer.enqueue(7).unwrap();
        drop(producer);
        assert_eq!(consumer.recv_timeout(Duration::from_millis(10)), Ok(Some(7)));
        assert_eq!(
            consumer.recv_timeout(Duration::from_millis(10)),
            Err(BufferError::Closed)
        );
    }

    #[test]
    fn test_send_timeout_on_full_queue() {
        let (producer, _consumer) = channel::<u32>(1, "Queue full");
        producer.enqueue(1).unwrap();
        assert_eq!(
            producer.send_timeout(2, Duration::from_millis(20)),
            Err(BufferError::SendTimeout { timeout_ms: 20 })
        );
    }
}
