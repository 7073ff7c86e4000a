use std::sync::Arc;
use std::time::Duration;

use fapilog_core::Event;
use fapilog_sinks::Sink;
use futures_util::future::join_all;
use tokio::sync::mpsc::Receiver;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::state::{AtomicWorkerState, WorkerState};

const MAX_RETRY_BACKOFF_S: f64 = 60.0;

pub struct WorkerConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub drain_deadline: Duration,
}

/// Pulls events off the bounded channel, groups them into batches, and
/// fans each batch out to every sink with independent retry/backoff.
/// Grounded on `r2e_events::local::LocalEventBus`'s semaphore-bounded
/// concurrent dispatch shape for sink isolation, and on
/// `r2e_scheduler`'s `CancellationToken`-driven shutdown for the drain
/// phase.
pub(crate) struct Worker {
    receiver: Receiver<Event>,
    sinks: Vec<Arc<dyn Sink>>,
    config: WorkerConfig,
    cancel: CancellationToken,
    state: Arc<AtomicWorkerState>,
    closed: bool,
    drain_deadline_at: Option<Instant>,
}

impl Worker {
    pub(crate) fn new(
        receiver: Receiver<Event>,
        sinks: Vec<Arc<dyn Sink>>,
        config: WorkerConfig,
        cancel: CancellationToken,
        state: Arc<AtomicWorkerState>,
    ) -> Self {
        Worker {
            receiver,
            sinks,
            config,
            cancel,
            state,
            closed: false,
            drain_deadline_at: None,
        }
    }

    pub(crate) async fn run(mut self) {
        self.state.store(WorkerState::Running);

        loop {
            let collected = match self.drain_deadline_at {
                Some(deadline) => match tokio::time::timeout_at(deadline, self.collect_batch()).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!("queue drain deadline exceeded, abandoning remaining events");
                        break;
                    }
                },
                None => self.collect_batch().await,
            };
            let (batch, closed) = collected;
            if !batch.is_empty() {
                self.dispatch_batch(&batch).await;
            }
            if closed {
                break;
            }
        }

        for sink in &self.sinks {
            let _ = sink.stop().await;
        }
        self.state.store(WorkerState::Stopped);
    }

    /// Collects up to `batch_size` events, or fewer if `batch_timeout`
    /// elapses while at least one event is already held. The cancellation
    /// race only ever happens while the batch is empty, so a shutdown
    /// signal can never discard events that were already pulled off the
    /// channel.
    async fn collect_batch(&mut self) -> (Vec<Event>, bool) {
        let mut batch = Vec::new();
        loop {
            if batch.len() >= self.config.batch_size {
                return (batch, false);
            }
            if batch.is_empty() {
                if self.closed {
                    match self.receiver.recv().await {
                        Some(event) => batch.push(event),
                        None => return (batch, true),
                    }
                } else {
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            self.closed = true;
                            self.receiver.close();
                            self.state.store(WorkerState::Stopping);
                            self.drain_deadline_at = Some(Instant::now() + self.config.drain_deadline);
                        }
                        maybe = self.receiver.recv() => {
                            match maybe {
                                Some(event) => batch.push(event),
                                None => return (batch, true),
                            }
                        }
                    }
                }
            } else {
                let sleep = tokio::time::sleep(self.config.batch_timeout);
                tokio::select! {
                    _ = sleep => return (batch, false),
                    maybe = self.receiver.recv() => {
                        match maybe {
                            Some(event) => batch.push(event),
                            None => return (batch, true),
                        }
                    }
                }
            }
        }
    }

    async fn dispatch_batch(&self, batch: &[Event]) {
        let batch = Arc::new(batch.to_vec());
        let futures = self.sinks.iter().cloned().map(|sink| {
            let batch = batch.clone();
            let retry_delay = self.config.retry_delay;
            let max_retries = self.config.max_retries;
            let cancel = self.cancel.clone();
            async move { deliver_with_retry(sink, batch, retry_delay, max_retries, cancel).await }
        });
        join_all(futures).await;
    }
}

async fn deliver_with_retry(
    sink: Arc<dyn Sink>,
    batch: Arc<Vec<Event>>,
    retry_delay: Duration,
    max_retries: u32,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    loop {
        match sink.write_batch(&batch).await {
            Ok(()) => return,
            Err(err) => {
                if attempt >= max_retries {
                    tracing::error!(error = %err, count = batch.len(), "dropping batch for sink after exhausting retries");
                    return;
                }
                let delay = (retry_delay.as_secs_f64() * 2f64.powi(attempt as i32)).min(MAX_RETRY_BACKOFF_S);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs_f64(delay)) => {}
                    _ = cancel.cancelled() => {
                        tracing::warn!(count = batch.len(), "sink retry interrupted by shutdown");
                        return;
                    }
                }
                attempt += 1;
            }
        }
    }
}
