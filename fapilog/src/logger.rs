//! Public logger facade and top-level bootstrap (`configure_logging`, C8).

use std::sync::{Arc, OnceLock};

use fapilog_core::error::FapilogError;
use fapilog_core::{Event, Level, Settings};
use fapilog_enrich::EnrichContext;
use fapilog_middleware::{CorrelationConfig, CorrelationLayer};
use tokio::sync::Mutex as AsyncMutex;

use crate::container::{Container, EnricherSource, SinkSource};
use crate::pipeline::Pipeline;

/// The configured logger handle returned by [`configure_logging`] or
/// [`Logger::build`]. Cheap to clone: every clone shares the same
/// underlying [`Container`].
#[derive(Clone)]
pub struct Logger {
    container: Arc<Container>,
}

impl Logger {
    /// Builds an independent, freshly configured logger — no process-wide
    /// state involved, so tests and specialized subsystems can run many of
    /// these side by side (§4.9).
    pub async fn build(
        settings: Settings,
        sinks: Option<Vec<SinkSource>>,
        enrichers: Option<Vec<EnricherSource>>,
    ) -> Result<Logger, FapilogError> {
        let container = Container::build(settings, sinks, enrichers).await?;
        Ok(Logger { container })
    }

    pub fn settings(&self) -> &Settings {
        self.container.settings()
    }

    pub fn dropped_count(&self) -> u64 {
        self.container.dropped_count()
    }

    pub async fn shutdown(&self) -> Result<(), FapilogError> {
        self.container.shutdown().await
    }

    pub async fn debug(&self, message: impl Into<String>, fields: Event) -> Option<Event> {
        self.log(Level::Debug, message, fields).await
    }

    pub async fn info(&self, message: impl Into<String>, fields: Event) -> Option<Event> {
        self.log(Level::Info, message, fields).await
    }

    pub async fn warning(&self, message: impl Into<String>, fields: Event) -> Option<Event> {
        self.log(Level::Warning, message, fields).await
    }

    pub async fn error(&self, message: impl Into<String>, fields: Event) -> Option<Event> {
        self.log(Level::Error, message, fields).await
    }

    pub async fn critical(&self, message: impl Into<String>, fields: Event) -> Option<Event> {
        self.log(Level::Critical, message, fields).await
    }

    /// Like [`Logger::log`], but runs step 4 (exception formatting) first.
    pub async fn error_with_exception(
        &self,
        message: impl Into<String>,
        mut fields: Event,
        error: &dyn std::error::Error,
    ) -> Option<Event> {
        Pipeline::format_exception(&mut fields, error);
        self.log(Level::Error, message, fields).await
    }

    /// Runs the full pipeline for one call site, or drops it up front if
    /// `level` is below the configured minimum (mirrors the redactor's own
    /// `level >= threshold` comparison in [`fapilog_redact::Redactor`]).
    pub async fn log(&self, level: Level, message: impl Into<String>, fields: Event) -> Option<Event> {
        if level < self.container.settings().level {
            return None;
        }
        let message = message.into();
        let ctx = EnrichContext {
            logger_handle: "fapilog".to_string(),
            method_name: level.as_str().to_string(),
            environment_tag: None,
        };
        let event = self.container.pipeline.process(&ctx, level, &message, fields).await?;
        self.container.dispatch(event.clone()).await;
        Some(event)
    }

    /// A fired-off, already-assembled record from the correlation
    /// middleware's exception hook (§4.8): the context snapshot already
    /// carries `trace_id`/`status_code=500`/etc, so it is passed through as
    /// the initial field set rather than through `get_context()` (the hook
    /// runs detached from the request's task-local scope).
    async fn emit_exception_record(&self, context_fields: Event) {
        self.log(Level::Error, "unhandled error in downstream handler", context_fields)
            .await;
    }

    /// Builds a [`CorrelationLayer`] wired so unhandled downstream errors
    /// are routed through this logger's full pipeline instead of falling
    /// back to a bare `tracing::error!` (§4.8's exception handling,
    /// avoiding a circular dependency between the middleware and facade
    /// crates).
    pub fn middleware_layer(&self) -> CorrelationLayer {
        let logger = self.clone();
        let config = CorrelationConfig {
            trace_header_name: self.container.settings().trace_header_name.clone(),
            outbound_propagation_enabled: self.container.settings().enable_httpx_trace_propagation,
            on_exception: Some(Arc::new(move |record: Event| {
                let logger = logger.clone();
                tokio::spawn(async move {
                    logger.emit_exception_record(record).await;
                });
            })),
        };
        CorrelationLayer::new(config)
    }
}

/// Process-wide default logger slot (§9: "if one process-wide default must
/// exist, encapsulate it as a named singleton with explicit lifecycle").
static DEFAULT_LOGGER: OnceLock<AsyncMutex<Option<Logger>>> = OnceLock::new();

/// Idempotent bootstrap entry point (§4.9). Called more than once with
/// settings equal to the currently configured logger's, returns the same
/// logger without duplicating workers or sinks; called with different
/// settings while one is already configured, fails explicitly with
/// [`FapilogError::AlreadyConfigured`] rather than silently replacing live
/// state out from under other holders of the original `Logger` handle.
pub async fn configure_logging(
    settings: Option<Settings>,
    sinks: Option<Vec<SinkSource>>,
    enrichers: Option<Vec<EnricherSource>>,
) -> Result<Logger, FapilogError> {
    let settings = settings.unwrap_or_default();
    let slot = DEFAULT_LOGGER.get_or_init(|| AsyncMutex::new(None));
    let mut guard = slot.lock().await;

    if let Some(existing) = guard.as_ref() {
        return if existing.settings() == &settings {
            Ok(existing.clone())
        } else {
            Err(FapilogError::AlreadyConfigured)
        };
    }

    let logger = Logger::build(settings, sinks, enrichers).await?;
    *guard = Some(logger.clone());
    Ok(logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // `DEFAULT_LOGGER` is a single process-wide static; any test that
    // configures it must run serially with respect to every other test that
    // does, or they race over the same slot.
    #[tokio::test]
    #[serial]
    async fn configure_logging_twice_with_equal_settings_returns_the_same_logger() {
        let settings = Settings::builder().queue_enabled(false).sinks(Vec::new()).build().unwrap();
        let a = configure_logging(Some(settings.clone()), None, None).await.unwrap();
        let b = configure_logging(Some(settings), None, None).await.unwrap();
        assert!(Arc::ptr_eq(&a.container, &b.container));
    }
}
