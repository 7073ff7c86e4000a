use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fapilog_core::error::{ErrorContext, FapilogError};
use fapilog_core::{Event, OverflowStrategy, Settings};
use fapilog_sinks::Sink;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::state::{AtomicWorkerState, WorkerState};
use crate::worker::{Worker, WorkerConfig};

pub struct QueueConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub overflow: OverflowStrategy,
    pub drain_deadline: Duration,
}

impl QueueConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        QueueConfig {
            capacity: settings.queue_size,
            batch_size: settings.batch_size,
            batch_timeout: settings.batch_timeout,
            retry_delay: settings.retry_delay,
            max_retries: settings.max_retries,
            overflow: settings.overflow_strategy,
            drain_deadline: Duration::from_secs(5),
        }
    }
}

/// Decouples log production from delivery: bounded buffering, batching,
/// retry with backoff, overflow policy, and graceful drain on shutdown
/// (§4.7). Owns no sinks of its own — `start` is handed the sinks to
/// dispatch to for the lifetime of the worker task.
pub struct QueueWorker {
    config: QueueConfig,
    state: Arc<AtomicWorkerState>,
    sender: AsyncMutex<Option<mpsc::Sender<Event>>>,
    dropped: AtomicU64,
    cancel: AsyncMutex<CancellationToken>,
    task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl QueueWorker {
    pub fn new(config: QueueConfig) -> Self {
        QueueWorker {
            config,
            state: Arc::new(AtomicWorkerState::new(WorkerState::Stopped)),
            sender: AsyncMutex::new(None),
            dropped: AtomicU64::new(0),
            cancel: AsyncMutex::new(CancellationToken::new()),
            task: AsyncMutex::new(None),
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state.load()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// `stopped -> starting -> running`: initializes the channel and spawns
    /// the dispatch task.
    pub async fn start(&self, sinks: Vec<Arc<dyn Sink>>) -> Result<(), FapilogError> {
        if !self.state.try_begin_start() {
            return Err(FapilogError::Queue {
                context: ErrorContext::new("queue", "start"),
                detail: "queue worker is already started".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(self.config.capacity.max(1));
        let cancel = CancellationToken::new();
        let worker = Worker::new(
            rx,
            sinks,
            WorkerConfig {
                batch_size: self.config.batch_size.max(1),
                batch_timeout: self.config.batch_timeout,
                retry_delay: self.config.retry_delay,
                max_retries: self.config.max_retries,
                drain_deadline: self.config.drain_deadline,
            },
            cancel.clone(),
            self.state.clone(),
        );
        let handle = tokio::spawn(worker.run());

        *self.sender.lock().await = Some(tx);
        *self.cancel.lock().await = cancel;
        *self.task.lock().await = Some(handle);
        Ok(())
    }

    /// Non-blocking enqueue (`queue_sink`, §4.7). Returns `false` if the
    /// event was discarded, whether due to overflow or because the worker
    /// is not `running`.
    pub fn queue_sink(&self, event: Event) -> bool {
        let sender = match self.sender.try_lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        if self.state.load() != WorkerState::Running {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        match self.config.overflow {
            OverflowStrategy::Drop => match sender.try_send(event) {
                Ok(()) => true,
                Err(_) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    false
                }
            },
            OverflowStrategy::Sample => {
                let remaining = sender.capacity();
                let fill_ratio = 1.0 - (remaining as f64 / self.config.capacity.max(1) as f64);
                if rand::random::<f64>() < fill_ratio {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
                match sender.try_send(event) {
                    Ok(()) => true,
                    Err(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        false
                    }
                }
            }
        }
    }

    /// Cooperative shutdown: idempotent, safe to call concurrently. The
    /// first caller drives the drain to completion; later callers observe
    /// the worker already gone and return immediately.
    pub async fn stop(&self) -> Result<(), FapilogError> {
        self.cancel.lock().await.cancel();
        *self.sender.lock().await = None;

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            handle.await.map_err(|err| FapilogError::Queue {
                context: ErrorContext::new("queue", "stop"),
                detail: format!("worker task panicked: {err}"),
            })?;
        }
        Ok(())
    }

    /// Synchronous shutdown entry point, safe to call from a thread that
    /// did not create the worker (e.g. a `Drop` impl or an `atexit`-style
    /// hook), grounded on `r2e-observability::OtelGuard`'s `Drop`-triggered
    /// shutdown pattern.
    pub fn stop_blocking(&self) -> Result<(), FapilogError> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => tokio::task::block_in_place(|| handle.block_on(self.stop())),
            Err(_) => {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|err| FapilogError::Queue {
                        context: ErrorContext::new("queue", "stop_blocking"),
                        detail: err.to_string(),
                    })?;
                rt.block_on(self.stop())
            }
        }
    }
}
