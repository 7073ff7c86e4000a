use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fapilog_core::{Event, FapilogError, OverflowStrategy};
use fapilog_queue::{QueueConfig, QueueWorker, WorkerState};
use fapilog_sinks::{BoxFuture, Sink};

#[derive(Debug)]
struct CountingSink(Arc<AtomicUsize>);

impl Sink for CountingSink {
    fn write(&self, _event: &Event) -> BoxFuture<'_, Result<(), FapilogError>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn write_batch<'a>(&'a self, events: &'a [Event]) -> BoxFuture<'a, Result<(), FapilogError>> {
        self.0.fetch_add(events.len(), Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }
}

fn test_config(capacity: usize, overflow: OverflowStrategy) -> QueueConfig {
    QueueConfig {
        capacity,
        batch_size: 10,
        batch_timeout: Duration::from_millis(20),
        retry_delay: Duration::from_millis(5),
        max_retries: 2,
        overflow,
        drain_deadline: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn enqueues_and_delivers_events_to_sinks() {
    let counter = Arc::new(AtomicUsize::new(0));
    let worker = QueueWorker::new(test_config(16, OverflowStrategy::Drop));
    worker.start(vec![Arc::new(CountingSink(counter.clone()))]).await.unwrap();

    for _ in 0..5 {
        assert!(worker.queue_sink(Event::new()));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    worker.stop().await.unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 5);
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[tokio::test]
async fn drop_overflow_discards_silently_and_counts() {
    let counter = Arc::new(AtomicUsize::new(0));
    let worker = QueueWorker::new(test_config(1, OverflowStrategy::Drop));
    worker.start(vec![Arc::new(CountingSink(counter))]).await.unwrap();

    // Flood past capacity before the worker drains a single batch.
    let mut accepted = 0;
    for _ in 0..50 {
        if worker.queue_sink(Event::new()) {
            accepted += 1;
        }
    }
    worker.stop().await.unwrap();
    assert!(accepted <= 50);
    assert!(worker.dropped_count() > 0);
}

#[tokio::test]
async fn events_after_stop_are_discarded() {
    let counter = Arc::new(AtomicUsize::new(0));
    let worker = QueueWorker::new(test_config(16, OverflowStrategy::Drop));
    worker.start(vec![Arc::new(CountingSink(counter))]).await.unwrap();
    worker.stop().await.unwrap();

    assert!(!worker.queue_sink(Event::new()));
}

#[tokio::test]
async fn stop_is_idempotent() {
    let worker = QueueWorker::new(test_config(16, OverflowStrategy::Drop));
    worker.start(vec![]).await.unwrap();
    worker.stop().await.unwrap();
    worker.stop().await.unwrap();
}
