mod common;

use std::sync::Arc;

use common::RecordingSink;
use fapilog::{Event, Logger, Settings, SinkSource};
use serde_json::json;

#[tokio::test]
async fn basic_json_emission_carries_exactly_the_expected_keys() {
    let settings = Settings::builder().queue_enabled(false).build().unwrap();
    let sink = RecordingSink::new();
    let logger = Logger::build(
        settings,
        Some(vec![SinkSource::Direct(Arc::new(sink.clone()))]),
        None,
    )
    .await
    .unwrap();

    let mut fields = Event::new();
    fields.insert("k".to_string(), json!(1));
    logger.info("hello", fields).await.unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    let event = &events[0];

    let mut keys: Vec<&str> = event.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["event", "k", "level", "timestamp"]);

    assert_eq!(event.get_str("level"), Some("info"));
    assert_eq!(event.get_str("event"), Some("hello"));
    assert_eq!(event.get("k"), Some(&json!(1)));
    assert!(event.get_str("timestamp").unwrap().contains('T'));
}
