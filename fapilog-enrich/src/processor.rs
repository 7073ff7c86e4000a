use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use fapilog_core::Event;
use futures_util::future::join_all;
use tracing::warn;

use crate::async_enricher::LifecycleHandle;
use crate::circuit::CircuitBreaker;
use crate::registry::{EnricherKind, EnricherRegistry};
use crate::sync_enricher::EnrichContext;

/// Runs custom enrichers in dependency-priority order (§4.3 step 8):
/// synchronous enrichers run inline, asynchronous enrichers in the same
/// level are spawned concurrently and awaited together, each under its own
/// timeout (the per-enricher override from its metadata, or this
/// processor's default). Levels run in sequence.
///
/// Grounded on `r2e-events::local::LocalEventBus`'s per-call `tokio::spawn`
/// plus `tokio::time::timeout` shape, and on `r2e-rate-limit`'s per-key
/// independent state for the per-enricher circuit breaker map.
pub struct AsyncEnricherProcessor {
    default_timeout: Duration,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    lifecycles: DashMap<String, Arc<LifecycleHandle>>,
}

impl AsyncEnricherProcessor {
    pub fn new(default_timeout: Duration) -> Self {
        AsyncEnricherProcessor {
            default_timeout,
            breakers: DashMap::new(),
            lifecycles: DashMap::new(),
        }
    }

    fn breaker_for(&self, name: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(3, Duration::from_secs(30))))
            .clone()
    }

    /// One lifecycle handle per enricher name, shared between whoever drives
    /// `startup`/`shutdown` (the container, §4.9) and `run`'s own
    /// `health_check` gating below.
    pub fn lifecycle_for(&self, name: &str) -> Arc<LifecycleHandle> {
        self.lifecycles.entry(name.to_string()).or_default().clone()
    }

    pub async fn run(
        &self,
        registry: &EnricherRegistry,
        levels: &[Vec<String>],
        ctx: &EnrichContext,
        mut event: Event,
    ) -> Event {
        for level in levels {
            let mut async_names = Vec::new();

            for name in level {
                let Some(registration) = registry.get(name) else {
                    continue;
                };
                if !registration.metadata.conditions.is_satisfied(&crate::metadata::ConditionContext {
                    environment_tag: ctx.environment_tag.clone(),
                    level: event.level(),
                }) {
                    continue;
                }
                match registration.kind {
                    EnricherKind::Sync(implementation) => {
                        if let Err(err) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            implementation.enrich(ctx, &mut event)
                        })) {
                            warn!(enricher = %name, ?err, "synchronous enricher panicked; contribution discarded");
                        }
                    }
                    EnricherKind::Async(_) => async_names.push(name.clone()),
                }
            }

            if async_names.is_empty() {
                continue;
            }

            let futures = async_names.iter().map(|name| {
                let registration = registry.get(name).expect("checked above");
                let EnricherKind::Async(implementation) = registration.kind else {
                    unreachable!("async_names only contains async registrations")
                };
                let breaker = self.breaker_for(name);
                let lifecycle = self.lifecycle_for(name);
                let timeout = registration.metadata.async_timeout.unwrap_or(self.default_timeout);
                let event_for_call = event.clone();
                let name = name.clone();
                async move {
                    if !implementation.health_check().await {
                        lifecycle.set_healthy(false);
                        warn!(enricher = %name, "async enricher reported unhealthy; skipped for this event");
                        return (name, None);
                    }
                    lifecycle.set_healthy(true);
                    if !breaker.allow() {
                        return (name, None);
                    }
                    match tokio::time::timeout(timeout, implementation.enrich_async(ctx, event_for_call)).await {
                        Ok(enriched) => {
                            breaker.record_success();
                            (name, Some(enriched))
                        }
                        Err(_) => {
                            breaker.record_failure();
                            warn!(enricher = %name, ?timeout, "async enricher group timed out; contribution discarded");
                            (name, None)
                        }
                    }
                }
            });

            let results = join_all(futures).await;
            for (_, outcome) in results {
                if let Some(enriched) = outcome {
                    merge_new_keys(&mut event, enriched);
                }
            }
        }

        event
    }
}

/// Folds an enricher's returned event back into the running event, honoring
/// "enrichers only add keys they do not already find" (§4.3).
fn merge_new_keys(event: &mut Event, enriched: Event) {
    for (key, value) in enriched.into_map() {
        event.set_if_absent(&key, value);
    }
}
