mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RecordingSink;
use fapilog::{Event, Level, Logger, OverflowStrategy, Settings, SinkSource};
use serde_json::json;

#[tokio::test]
async fn excess_events_are_dropped_and_counted_while_retained_ones_still_arrive_in_order() {
    let settings = Settings::builder()
        .queue_enabled(true)
        .queue_size(2)
        .batch_size(10)
        .batch_timeout(Duration::from_millis(20))
        .overflow_strategy(OverflowStrategy::Drop)
        .build()
        .unwrap();
    let sink = RecordingSink::new();
    let logger = Logger::build(settings, Some(vec![SinkSource::Direct(Arc::new(sink.clone()))]), None)
        .await
        .unwrap();

    // With no enrichers registered, `Pipeline::process` and `Container::dispatch`
    // never actually suspend, so none of these four calls yields control back
    // to the runtime — the queue worker's background task has no chance to
    // drain a single slot before all four `try_send`s resolve against the
    // size-2 channel.
    for i in 0..4 {
        let mut fields = Event::new();
        fields.insert("i".to_string(), json!(i));
        logger.log(Level::Info, "e", fields).await;
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    logger.shutdown().await.unwrap();

    assert_eq!(logger.dropped_count(), 2);
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].get("i"), Some(&json!(0)));
    assert_eq!(events[1].get("i"), Some(&json!(1)));
}
