//! Container / Facade (C8, §4.9): idempotent bootstrap, lifecycle
//! ownership of the queue worker and the async-enricher manager, and the
//! mixed URI-or-direct-instance builder for sinks and enrichers that
//! `Settings` itself (URI-only, §4.2) deliberately leaves to this layer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fapilog_core::error::FapilogError;
use fapilog_core::uri::ParsedUri;
use fapilog_core::Settings;
use fapilog_enrich::{AsyncEnricherProcessor, EnricherKind, EnricherMetadata, EnricherRegistry, LifecycleState};
use fapilog_queue::{QueueConfig, QueueWorker};
use fapilog_redact::Redactor;
use fapilog_sinks::{RotatingFileSink, Sink, SinkRegistry, StdoutSink};

use crate::pipeline::Pipeline;

/// A sink supplied to the container either by URI (routed through the
/// registry's factories) or as an already-built instance (§9's "mixed
/// settings list... tagged union" guidance).
pub enum SinkSource {
    Uri(String),
    Direct(Arc<dyn Sink>),
}

/// The enricher-side counterpart of [`SinkSource`].
pub enum EnricherSource {
    Uri(String),
    Direct {
        metadata: EnricherMetadata,
        kind: EnricherKind,
    },
}

/// Owns every long-lived subsystem a configured logger needs: the sink and
/// enricher registries, the resolved pipeline, and (when queueing is
/// enabled) the queue worker. Multiple independent containers may coexist
/// in one process (§4.9).
pub struct Container {
    pub(crate) settings: Settings,
    enricher_registry: Arc<EnricherRegistry>,
    active_enricher_names: Vec<String>,
    async_processor: Arc<AsyncEnricherProcessor>,
    pub(crate) pipeline: Pipeline,
    sinks: Vec<Arc<dyn Sink>>,
    queue: Option<QueueWorker>,
    shutdown_started: AtomicBool,
}

impl Container {
    pub async fn build(
        settings: Settings,
        sinks: Option<Vec<SinkSource>>,
        enrichers: Option<Vec<EnricherSource>>,
    ) -> Result<Arc<Container>, FapilogError> {
        let sink_registry = SinkRegistry::new();
        register_builtin_sinks(&sink_registry)?;
        let sink_sources =
            sinks.unwrap_or_else(|| settings.sinks.iter().cloned().map(SinkSource::Uri).collect());
        let resolved_sinks = build_sinks(&sink_registry, sink_sources)?;

        let enricher_registry = Arc::new(EnricherRegistry::new());
        let enricher_sources = enrichers
            .unwrap_or_else(|| settings.enrichers.iter().cloned().map(EnricherSource::Uri).collect());
        let active_names = register_enrichers(&enricher_registry, enricher_sources)?;
        let enricher_levels = enricher_registry.resolve_order(&active_names)?;

        let async_processor = Arc::new(AsyncEnricherProcessor::new(Duration::from_secs(5)));
        for name in &active_names {
            if let Some(registration) = enricher_registry.get(name) {
                if let EnricherKind::Async(implementation) = registration.kind {
                    let lifecycle = async_processor.lifecycle_for(name);
                    lifecycle.set_state(LifecycleState::Started);
                    implementation.startup().await;
                    lifecycle.set_state(LifecycleState::Running);
                }
            }
        }

        let redactor = Redactor::new(&settings)?;
        let pipeline = Pipeline::new(
            &settings,
            redactor,
            enricher_registry.clone(),
            async_processor.clone(),
            enricher_levels,
        );

        for sink in &resolved_sinks {
            sink.start().await?;
        }
        let queue = if settings.queue_enabled {
            let worker = QueueWorker::new(QueueConfig::from_settings(&settings));
            worker.start(resolved_sinks.clone()).await?;
            Some(worker)
        } else {
            None
        };

        Ok(Arc::new(Container {
            settings,
            enricher_registry,
            active_enricher_names: active_names,
            async_processor,
            pipeline,
            sinks: resolved_sinks,
            queue,
            shutdown_started: AtomicBool::new(false),
        }))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Terminal pipeline step (§4.3 step 11): hand the event to the queue
    /// when queueing is enabled, else write it to every sink directly
    /// (which may block the caller, per §4.5).
    pub async fn dispatch(&self, event: fapilog_core::Event) {
        match &self.queue {
            Some(queue) => {
                queue.queue_sink(event);
            }
            None => {
                for sink in &self.sinks {
                    if let Err(err) = sink.write(&event).await {
                        tracing::error!(error = %err, "sink write failed with no queue to retry through");
                    }
                }
            }
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.queue.as_ref().map(QueueWorker::dropped_count).unwrap_or(0)
    }

    /// Drains the queue, stops async enrichers, and closes any sinks the
    /// queue does not already own (§4.9). Idempotent.
    pub async fn shutdown(&self) -> Result<(), FapilogError> {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match &self.queue {
            Some(queue) => queue.stop().await?,
            None => {
                for sink in &self.sinks {
                    let _ = sink.stop().await;
                }
            }
        }

        for name in &self.active_enricher_names {
            if let Some(registration) = self.enricher_registry.get(name) {
                if let EnricherKind::Async(implementation) = registration.kind {
                    let lifecycle = self.async_processor.lifecycle_for(name);
                    lifecycle.set_state(LifecycleState::Stopping);
                    implementation.shutdown().await;
                    lifecycle.set_state(LifecycleState::Stopped);
                }
            }
        }

        Ok(())
    }
}

fn register_builtin_sinks(registry: &SinkRegistry) -> Result<(), FapilogError> {
    registry.register_sink(
        "stdout",
        Arc::new(|uri: &ParsedUri| Ok(Arc::new(StdoutSink::from_uri(uri)) as Arc<dyn Sink>)),
    )?;
    registry.register_sink(
        "file",
        Arc::new(|uri: &ParsedUri| RotatingFileSink::from_uri(uri).map(|s| Arc::new(s) as Arc<dyn Sink>)),
    )?;
    registry.register_sink(
        "remote",
        Arc::new(|uri: &ParsedUri| fapilog_remote::from_uri(uri).map(|s| s as Arc<dyn Sink>)),
    )?;
    Ok(())
}

fn build_sinks(registry: &SinkRegistry, sources: Vec<SinkSource>) -> Result<Vec<Arc<dyn Sink>>, FapilogError> {
    sources
        .into_iter()
        .map(|source| match source {
            SinkSource::Uri(uri) => registry.create_from_uri(&uri),
            SinkSource::Direct(sink) => Ok(sink),
        })
        .collect()
}

/// Registers every enricher source and returns the names that are actually
/// active, in the order they were supplied, for `resolve_order` to order.
fn register_enrichers(
    registry: &EnricherRegistry,
    sources: Vec<EnricherSource>,
) -> Result<Vec<String>, FapilogError> {
    let mut active = Vec::new();
    for source in sources {
        match source {
            EnricherSource::Uri(uri) => {
                let before: HashSet<String> =
                    registry.list_enrichers().into_iter().map(|m| m.name).collect();
                registry.create_from_uri(&uri)?;
                let added = registry
                    .list_enrichers()
                    .into_iter()
                    .map(|m| m.name)
                    .find(|name| !before.contains(name));
                if let Some(name) = added {
                    active.push(name);
                }
            }
            EnricherSource::Direct { metadata, kind } => {
                let name = metadata.name.clone();
                registry.register(metadata, kind)?;
                active.push(name);
            }
        }
    }
    Ok(active)
}
