//! The delivery worker: one thread per pipeline moving events from the
//! queue to the sinks.

use crate::buffer::QueueConsumer;
use crate::diagnostic;
use crate::domain::{LogEvent, PipelineError};
use crate::sink::BoxedSink;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to a running delivery thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct DeliveryWorker {
    name: String,
    stop: Arc<AtomicBool>,
    done: crossbeam_channel::Receiver<()>,
    handle: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

/// Keeps the live-worker count honest even if the thread unwinds.
struct LiveMarker {
    live: Arc<AtomicUsize>,
    done: crossbeam_channel::Sender<()>,
}

impl Drop for LiveMarker {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        let _ = self.done.try_send(());
    }
}

impl DeliveryWorker {
    pub fn spawn(
        name: &str,
        consumer: QueueConsumer<LogEvent>,
        sinks: Vec<BoxedSink>,
        poll_interval: Duration,
        shutdown_timeout: Duration,
        live: Arc<AtomicUsize>,
    ) -> Result<Self, PipelineError> {
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = crossbeam_channel::bounded(1);

        live.fetch_add(1, Ordering::AcqRel);
        let marker = LiveMarker {
            live,
            done: done_tx,
        };

        let thread_stop = Arc::clone(&stop);
        let thread_name = format!("log-worker-{name}");
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let _marker = marker;
                run(&consumer, sinks, poll_interval, &thread_stop);
            })
            .map_err(|source| PipelineError::Spawn {
                thread: thread_name,
                source,
            })?;

        Ok(Self {
            name: name.to_string(),
            stop,
            done,
            handle: Some(handle),
            shutdown_timeout,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the thread, then waits up to the shutdown timeout for it to
    /// drain the queue and close its sinks. A thread that overruns is
    /// detached. Calling this again is a no-op.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.stop.store(true, Ordering::Release);

        match self.done.recv_timeout(self.shutdown_timeout) {
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    diagnostic!("Delivery worker '{}' panicked", self.name);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                diagnostic!(
                    "Delivery worker '{}' did not stop within {}ms; detaching",
                    self.name,
                    self.shutdown_timeout.as_millis()
                );
            }
        }
    }
}

impl Drop for DeliveryWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    consumer: &QueueConsumer<LogEvent>,
    mut sinks: Vec<BoxedSink>,
    poll_interval: Duration,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::Acquire) {
        match consumer.recv_timeout(poll_interval) {
            Ok(Some(event)) => {
                dispatch(&mut sinks, &event);
                consumer.mark_delivered();
            }
            Ok(None) => {}
            Err(_) => break,
        }
    }

    while let Some(event) = consumer.try_recv() {
        dispatch(&mut sinks, &event);
        consumer.mark_delivered();
    }

    for sink in &mut sinks {
        let name = sink.name().to_string();
        match catch_unwind(AssertUnwindSafe(|| sink.close())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => diagnostic!("Sink '{name}' failed to close: {e}"),
            Err(_) => diagnostic!("Sink '{name}' panicked while closing"),
        }
    }
}

/// Hands `event` to every sink whose minimum level it meets. A failing or
/// panicking sink is reported and skipped; the rest still see the event.
pub(crate) fn dispatch(sinks: &mut [BoxedSink], event: &LogEvent) {
    for sink in &mut *sinks {
        if event.level < sink.min_level() {
            continue;
        }
        match catch_unwind(AssertUnwindSafe(|| sink.emit(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => diagnostic!("Sink '{}' failed: {e}", sink.name()),
            Err(_) => diagnostic!("Sink '{}' panicked while emitting", sink.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::channel;
    use crate::domain::Level;
    use crate::domain::event::test_support::sample_event;
    use crate::format::TextFormatter;
    use crate::sink::{MemorySink, Sink, SinkError};

    struct FailingSink;

    impl Sink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }
        fn min_level(&self) -> Level {
            Level::DEBUG
        }
        fn emit(&mut self, _event: &LogEvent) -> Result<(), SinkError> {
            Err(SinkError::Io(std::io::Error::other("disk gone")))
        }
    }

    struct PanickingSink;

    impl Sink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }
        fn min_level(&self) -> Level {
            Level::DEBUG
        }
        fn emit(&mut self, _event: &LogEvent) -> Result<(), SinkError> {
            panic!("sink bug");
        }
    }

    #[test]
    fn test_failing_sinks_do_not_starve_others() {
        let memory = MemorySink::new(Arc::new(TextFormatter), Level::DEBUG);
        let handle = memory.handle();
        let mut sinks: Vec<BoxedSink> =
            vec![Box::new(FailingSink), Box::new(PanickingSink), Box::new(memory)];

        dispatch(&mut sinks, &sample_event(Level::INFO, "survives"));
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_sink_min_level_respected() {
        let memory = MemorySink::new(Arc::new(TextFormatter), Level::ERROR);
        let handle = memory.handle();
        let mut sinks: Vec<BoxedSink> = vec![Box::new(memory)];

        dispatch(&mut sinks, &sample_event(Level::WARNING, "skipped"));
        dispatch(&mut sinks, &sample_event(Level::ERROR, "kept"));
        assert_eq!(handle.len(), 1);
        assert!(handle.lines()[0].contains("kept"));
    }

    #[test]
    fn test_stop_drains_and_closes() {
        let (producer, consumer) = channel(0, "Queue full");
        let memory = MemorySink::new(Arc::new(TextFormatter), Level::DEBUG);
        let handle = memory.handle();
        let live = Arc::new(AtomicUsize::new(0));

        let mut worker = DeliveryWorker::spawn(
            "drain",
            consumer,
            vec![Box::new(memory)],
            Duration::from_millis(20),
            Duration::from_secs(5),
            Arc::clone(&live),
        )
        .unwrap();
        assert_eq!(live.load(Ordering::Acquire), 1);

        for i in 0..100 {
            producer.enqueue(sample_event(Level::INFO, &format!("event {i}"))).unwrap();
        }
        worker.stop();

        assert_eq!(handle.len(), 100);
        assert!(handle.is_closed());
        assert_eq!(live.load(Ordering::Acquire), 0);
        assert!(!worker.is_running());

        worker.stop();
        assert_eq!(live.load(Ordering::Acquire), 0);
    }
}
