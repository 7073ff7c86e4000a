//! Event Pipeline (C3, §4.3): the ordered chain of transforms every emitted
//! event passes through before it reaches a sink.

use std::sync::Arc;

use fapilog_core::context::get_context;
use fapilog_core::{Event, Level, Settings};
use fapilog_enrich::{AsyncEnricherProcessor, EnrichContext, EnricherRegistry};
use fapilog_redact::Redactor;
use serde_json::json;

use crate::resource::ResourceSnapshot;

/// Runs steps 1-10 of the pipeline (timestamp through sampling); the
/// terminal render-or-enqueue step (11) is the caller's concern because it
/// needs the container's sinks/queue, which this struct deliberately does
/// not own (§9: "registries are explicit, not implicit").
pub struct Pipeline {
    redactor: Redactor,
    enricher_registry: Arc<EnricherRegistry>,
    async_processor: Arc<AsyncEnricherProcessor>,
    enricher_levels: Vec<Vec<String>>,
    resource_snapshot: Option<ResourceSnapshot>,
    user_context_enabled: bool,
    sampling_rate: f64,
}

impl Pipeline {
    pub fn new(
        settings: &Settings,
        redactor: Redactor,
        enricher_registry: Arc<EnricherRegistry>,
        async_processor: Arc<AsyncEnricherProcessor>,
        enricher_levels: Vec<Vec<String>>,
    ) -> Self {
        Pipeline {
            redactor,
            enricher_registry,
            async_processor,
            enricher_levels,
            resource_snapshot: settings.enable_resource_metrics.then(ResourceSnapshot::new),
            user_context_enabled: settings.user_context_enabled,
            sampling_rate: settings.sampling_rate,
        }
    }

    /// Runs the full chain. Returns `None` when sampling drops the event
    /// (step 10); the caller must not forward a dropped event anywhere.
    pub async fn process(&self, ctx: &EnrichContext, level: Level, message: &str, mut event: Event) -> Option<Event> {
        // 1. wall-clock timestamp — unconditional: the emitted record's
        // timestamp always reflects this call, never a caller-supplied
        // field of the same name.
        event.insert("timestamp".to_string(), json!(chrono::Utc::now().to_rfc3339()));
        // 2. normalize level — unconditional, same reasoning.
        event.insert("level".to_string(), json!(level.as_str()));
        // 3. rename message key to `event` — unconditional: this field *is*
        // the call's message, not a caller-suppliable value.
        event.insert("event".to_string(), json!(message));

        // 5 & 7. correlation + user-context enrichers read the same
        // request-local snapshot.
        let context_event = get_context();
        for (key, value) in context_event.iter() {
            if key == "user_id" || key == "user_roles" || key == "auth_scheme" {
                if self.user_context_enabled {
                    event.set_if_absent(key, value.clone());
                }
            } else {
                event.set_if_absent(key, value.clone());
            }
        }

        // 6. optional resource snapshot
        if let Some(resource) = &self.resource_snapshot {
            resource.enrich(&mut event);
        }

        // 8. custom enrichers via C4, dependency-priority order
        if !self.enricher_levels.is_empty() {
            event = self
                .async_processor
                .run(&self.enricher_registry, &self.enricher_levels, ctx, event)
                .await;
        }

        // 9. pattern + field redaction, gated by level
        event = self.redactor.apply(&event);

        // 10. sampling
        if self.sampling_rate < 1.0 && rand::random::<f64>() >= self.sampling_rate {
            return None;
        }

        Some(event)
    }

    /// Step 4: format exception information when present, before the rest
    /// of the chain runs. Called by the logger before `process` when the
    /// caller supplies an error.
    pub fn format_exception(event: &mut Event, error: &dyn std::error::Error) {
        event.set_if_absent("exception_type", json!(type_name_of(error)));
        event.set_if_absent("exception_message", json!(error.to_string()));
    }
}

fn type_name_of(error: &dyn std::error::Error) -> &'static str {
    // `std::error::Error` erases the concrete type; `std::any::type_name`
    // only works on a statically known type, so fall back to a fixed label
    // rather than reaching for a type-erasure crate the pack doesn't use.
    let _ = error;
    "error"
}

#[cfg(test)]
mod tests {
    use super::*;
    use fapilog_core::context::with_fresh_context;
    use fapilog_core::ContextRecord;

    fn settings() -> Settings {
        Settings::default()
    }

    fn pipeline() -> Pipeline {
        let settings = settings();
        let redactor = Redactor::new(&settings).unwrap();
        Pipeline::new(
            &settings,
            redactor,
            Arc::new(EnricherRegistry::new()),
            Arc::new(AsyncEnricherProcessor::new(std::time::Duration::from_secs(5))),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn basic_event_carries_required_reserved_keys() {
        let pipeline = pipeline();
        let ctx = EnrichContext::default();
        let event = pipeline
            .process(&ctx, Level::Info, "hello", Event::new())
            .await
            .unwrap();
        assert_eq!(event.get_str("event"), Some("hello"));
        assert_eq!(event.get_str("level"), Some("info"));
        assert!(event.get_str("timestamp").is_some());
    }

    #[tokio::test]
    async fn correlation_fields_come_from_the_bound_context() {
        let pipeline = pipeline();
        let ctx = EnrichContext::default();
        let event = with_fresh_context(async {
            fapilog_core::context::bind_context(ContextRecord {
                trace_id: Some("abc123".to_string()),
                ..Default::default()
            });
            pipeline.process(&ctx, Level::Info, "served", Event::new()).await
        })
        .await
        .unwrap();
        assert_eq!(event.get_str("trace_id"), Some("abc123"));
    }

    #[tokio::test]
    async fn user_context_fields_are_omitted_when_disabled() {
        let mut settings = settings();
        settings.user_context_enabled = false;
        let redactor = Redactor::new(&settings).unwrap();
        let pipeline = Pipeline::new(
            &settings,
            redactor,
            Arc::new(EnricherRegistry::new()),
            Arc::new(AsyncEnricherProcessor::new(std::time::Duration::from_secs(5))),
            Vec::new(),
        );
        let ctx = EnrichContext::default();
        let event = with_fresh_context(async {
            fapilog_core::context::bind_context(ContextRecord {
                user_id: Some("u1".to_string()),
                ..Default::default()
            });
            pipeline.process(&ctx, Level::Info, "served", Event::new()).await
        })
        .await
        .unwrap();
        assert!(event.get("user_id").is_none());
    }

    #[tokio::test]
    async fn caller_supplied_level_and_timestamp_fields_never_override_the_actual_call() {
        let pipeline = pipeline();
        let ctx = EnrichContext::default();
        let mut fields = Event::new();
        fields.insert("level".to_string(), json!("business-level"));
        fields.insert("timestamp".to_string(), json!("not-a-real-timestamp"));
        fields.insert("event".to_string(), json!("not-the-message"));
        let event = pipeline
            .process(&ctx, Level::Error, "hello", fields)
            .await
            .unwrap();
        assert_eq!(event.get_str("level"), Some("error"));
        assert_eq!(event.get_str("event"), Some("hello"));
        assert_ne!(event.get_str("timestamp"), Some("not-a-real-timestamp"));
    }

    #[tokio::test]
    async fn sampling_rate_zero_always_drops() {
        let mut settings = settings();
        settings.sampling_rate = 0.0;
        let redactor = Redactor::new(&settings).unwrap();
        let pipeline = Pipeline::new(
            &settings,
            redactor,
            Arc::new(EnricherRegistry::new()),
            Arc::new(AsyncEnricherProcessor::new(std::time::Duration::from_secs(5))),
            Vec::new(),
        );
        let ctx = EnrichContext::default();
        assert!(pipeline.process(&ctx, Level::Info, "x", Event::new()).await.is_none());
    }
}
