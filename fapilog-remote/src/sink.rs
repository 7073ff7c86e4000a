use std::sync::Arc;
use std::time::Duration;

use fapilog_core::error::{ErrorContext, FapilogError};
use fapilog_core::Event;
use fapilog_sinks::{BoxFuture, Sink};
use reqwest::StatusCode;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::RemoteConfig;
use crate::wire::group_into_streams;

const MAX_BACKOFF_S: f64 = 60.0;

/// Delivers batches of events to a log aggregation endpoint as grouped
/// streams (§4.6). Buffers internally and flushes on its own schedule so a
/// slow endpoint never blocks the caller — the worker's own batching
/// (§4.7) is a separate, coarser layer above this one.
#[derive(Debug)]
pub struct RemoteSink {
    config: RemoteConfig,
    client: reqwest::Client,
    cancel: CancellationToken,
    buffer: Mutex<Vec<Event>>,
    flush_notify: Notify,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteSink {
    pub fn new(config: RemoteConfig) -> Self {
        RemoteSink {
            config,
            client: reqwest::Client::new(),
            cancel: CancellationToken::new(),
            buffer: Mutex::new(Vec::new()),
            flush_notify: Notify::new(),
            flush_task: Mutex::new(None),
        }
    }

    async fn push(&self, events: impl IntoIterator<Item = Event>) {
        let mut buffer = self.buffer.lock().await;
        buffer.extend(events);
        if buffer.len() >= self.config.batch_size {
            self.flush_notify.notify_one();
        }
    }

    async fn drain_ready_chunks(&self) -> Vec<Vec<Event>> {
        let mut buffer = self.buffer.lock().await;
        if buffer.is_empty() {
            return Vec::new();
        }
        let taken = std::mem::take(&mut *buffer);
        taken.chunks(self.config.batch_size.max(1)).map(|c| c.to_vec()).collect()
    }

    async fn flush_once(self: &Arc<Self>) {
        for chunk in self.drain_ready_chunks().await {
            self.deliver_with_retry(chunk).await;
        }
    }

    async fn deliver_with_retry(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        let payload = group_into_streams(&self.config.labels, &events);
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize remote batch, dropping");
                return;
            }
        };

        let mut attempt: u32 = 0;
        loop {
            let mut request = self
                .client
                .post(&self.config.endpoint)
                .header("content-type", "application/json")
                .body(body.clone());
            for (name, value) in &self.config.auth_headers {
                request = request.header(name.as_str(), value.as_str());
            }
            if let Some((name, value)) = &self.config.tenant_header {
                request = request.header(name.as_str(), value.as_str());
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => return,
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        if !self.backoff_or_stop(attempt, events.len()).await {
                            return;
                        }
                        attempt += 1;
                        continue;
                    }
                    tracing::error!(status = %status, count = events.len(), "remote sink dropped batch after non-retryable response");
                    return;
                }
                Err(err) => {
                    if !self.backoff_or_stop(attempt, events.len()).await {
                        tracing::error!(error = %err, count = events.len(), "remote sink dropped batch after exhausting retries");
                        return;
                    }
                    attempt += 1;
                    continue;
                }
            }
        }
    }

    /// Sleeps for the exponential backoff delay, interruptible by
    /// cancellation. Returns `false` once `max_retries` is exhausted or the
    /// sink has been told to stop.
    async fn backoff_or_stop(&self, attempt: u32, batch_len: usize) -> bool {
        if attempt >= self.config.max_retries {
            return false;
        }
        let delay = (self.config.backoff_base_s * 2f64.powi(attempt as i32)).min(MAX_BACKOFF_S);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(delay)) => true,
            _ = self.cancel.cancelled() => {
                tracing::warn!(count = batch_len, "remote sink backoff interrupted by shutdown");
                false
            }
        }
    }
}

impl Sink for RemoteSink {
    fn start(&self) -> BoxFuture<'_, Result<(), FapilogError>> {
        Box::pin(async move { Ok(()) })
    }

    fn write(&self, event: &Event) -> BoxFuture<'_, Result<(), FapilogError>> {
        let event = event.clone();
        Box::pin(async move {
            self.push(std::iter::once(event)).await;
            Ok(())
        })
    }

    fn write_batch<'a>(&'a self, events: &'a [Event]) -> BoxFuture<'a, Result<(), FapilogError>> {
        Box::pin(async move {
            self.push(events.iter().cloned()).await;
            Ok(())
        })
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), FapilogError>> {
        Box::pin(async move {
            self.cancel.cancel();
            if let Some(handle) = self.flush_task.lock().await.take() {
                let _ = handle.await;
            }
            let remaining = self.drain_ready_chunks().await;
            for chunk in remaining {
                self.deliver_with_retry(chunk).await;
            }
            Ok(())
        })
    }
}

/// Spawns the background task that flushes `sink` on its configured
/// interval or whenever a chunk reaches `batch_size`, grounded on
/// `r2e-scheduler`'s cancellation-cooperative interval-task shape. The
/// returned handle must be stored so `Sink::stop` can await its exit.
pub fn spawn_flush_loop(sink: Arc<RemoteSink>) {
    let interval = sink.config.flush_interval;
    let cancel = sink.cancel.clone();
    let task_sink = sink.clone();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = task_sink.flush_notify.notified() => {}
                _ = cancel.cancelled() => {
                    task_sink.flush_once().await;
                    break;
                }
            }
            task_sink.flush_once().await;
        }
    });
    // Best effort: if `stop()` races `spawn_flush_loop`, the task simply
    // runs to completion unobserved by `stop()`'s join.
    if let Ok(mut slot) = sink.flush_task.try_lock() {
        *slot = Some(handle);
    } else {
        handle.abort();
    }
}

pub fn from_uri(uri: &fapilog_core::uri::ParsedUri) -> Result<Arc<RemoteSink>, FapilogError> {
    if uri.host.is_none() {
        return Err(FapilogError::Configuration {
            context: ErrorContext::new("remote_sink", "from_uri"),
            constraint: "remote:// URI must carry a host".to_string(),
        });
    }
    let config = RemoteConfig::from_uri(uri);
    let sink = Arc::new(RemoteSink::new(config));
    spawn_flush_loop(sink.clone());
    Ok(sink)
}
