mod common;

use std::sync::Arc;

use common::RecordingSink;
use fapilog::{Event, Level, Logger, Settings, SinkSource};
use serde_json::json;

fn sample_fields() -> Event {
    let value = json!({
        "user": {"password": "p", "email": "e"},
        "token": "t",
        "q": 1,
    });
    Event::from_map(value.as_object().unwrap().clone())
}

async fn build_logger(level: Level) -> (Logger, RecordingSink) {
    let settings = Settings::builder()
        .queue_enabled(false)
        .level(level)
        .redact_fields(vec!["user.password".to_string(), "token".to_string()])
        .redact_replacement("REDACTED")
        .build()
        .unwrap();
    let sink = RecordingSink::new();
    let logger = Logger::build(settings, Some(vec![SinkSource::Direct(Arc::new(sink.clone()))]), None)
        .await
        .unwrap();
    (logger, sink)
}

#[tokio::test]
async fn fields_at_or_above_redact_level_are_replaced() {
    let (logger, sink) = build_logger(Level::Info).await;
    logger.info("request handled", sample_fields()).await.unwrap();

    let events = sink.events();
    let event = &events[0];
    assert_eq!(event.get("user").unwrap().get("password").unwrap(), &json!("REDACTED"));
    assert_eq!(event.get("user").unwrap().get("email").unwrap(), &json!("e"));
    assert_eq!(event.get("token"), Some(&json!("REDACTED")));
    assert_eq!(event.get("q"), Some(&json!(1)));
}

#[tokio::test]
async fn the_same_fields_below_redact_level_are_unchanged() {
    let (logger, sink) = build_logger(Level::Debug).await;
    logger.debug("request handled", sample_fields()).await.unwrap();

    let events = sink.events();
    let event = &events[0];
    assert_eq!(event.get("user").unwrap().get("password").unwrap(), &json!("p"));
    assert_eq!(event.get("token"), Some(&json!("t")));
}
