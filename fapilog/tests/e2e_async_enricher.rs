mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RecordingSink;
use fapilog::{
    AsyncEnricher, EnricherKind, EnricherMetadata, EnricherSource, Event, Logger, Settings, SinkSource, SyncEnricher,
};
use fapilog_enrich::{BoxFuture, EnrichContext};
use serde_json::json;

struct AddsField {
    key: &'static str,
    value: &'static str,
}

impl SyncEnricher for AddsField {
    fn enrich(&self, _ctx: &EnrichContext, event: &mut Event) -> Result<(), fapilog::FapilogError> {
        event.set_if_absent(self.key, json!(self.value));
        Ok(())
    }
}

struct SlowAsync {
    key: &'static str,
    sleep: Duration,
}

impl AsyncEnricher for SlowAsync {
    fn enrich_async<'a>(&'a self, _ctx: &'a EnrichContext, mut event: Event) -> BoxFuture<'a, Event> {
        Box::pin(async move {
            tokio::time::sleep(self.sleep).await;
            event.set_if_absent(self.key, json!(true));
            event
        })
    }
}

#[tokio::test(start_paused = true)]
async fn a_slow_async_group_member_contributes_nothing_while_its_dependency_chain_still_runs() {
    let settings = Settings::builder().queue_enabled(false).build().unwrap();
    let sink = RecordingSink::new();

    let enrichers = vec![
        EnricherSource::Direct {
            metadata: EnricherMetadata::new("a", 10),
            kind: EnricherKind::Sync(Arc::new(AddsField { key: "a", value: "1" })),
        },
        EnricherSource::Direct {
            metadata: EnricherMetadata::new("b", 20).with_dependencies(vec!["a".to_string()]),
            kind: EnricherKind::Sync(Arc::new(AddsField { key: "b", value: "1" })),
        },
        // Depends on `a` so it lands in the same dependency level as `b`
        // rather than running alongside `a` itself (both would otherwise
        // share priority 10 with no ordering relation between them).
        EnricherSource::Direct {
            metadata: EnricherMetadata::new("c", 10)
                .with_dependencies(vec!["a".to_string()])
                .async_capable()
                .with_async_timeout(Duration::from_millis(50)),
            kind: EnricherKind::Async(Arc::new(SlowAsync {
                key: "c",
                sleep: Duration::from_millis(200),
            })),
        },
    ];

    let logger = Logger::build(
        settings,
        Some(vec![SinkSource::Direct(Arc::new(sink.clone()))]),
        Some(enrichers),
    )
    .await
    .unwrap();

    let handle = tokio::spawn(async move {
        logger.info("tick", Event::new()).await;
        logger
    });
    tokio::time::advance(Duration::from_millis(60)).await;
    let logger = handle.await.unwrap();
    logger.shutdown().await.unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.get("a"), Some(&json!("1")));
    assert_eq!(event.get("b"), Some(&json!("1")));
    assert_eq!(event.get("c"), None);
}
