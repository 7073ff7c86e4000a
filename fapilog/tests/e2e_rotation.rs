use fapilog::{Event, Logger, Settings};
use serde_json::json;

#[tokio::test]
async fn a_file_sink_rotates_and_respects_its_backup_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let uri = format!("file://{}?max_bytes=64&backup_count=2", path.display());

    let settings = Settings::builder().queue_enabled(false).sinks(vec![uri]).build().unwrap();
    let logger = Logger::build(settings, None, None).await.unwrap();

    // Each line is well over 20 bytes once timestamp/level/event are added,
    // so three writes comfortably cross the 64-byte threshold more than
    // once, forcing at least one rotation past `backup_count`.
    for i in 0..3 {
        let mut fields = Event::new();
        fields.insert("i".to_string(), json!(i));
        logger.info("padding-the-line-past-the-threshold", fields).await;
    }
    logger.shutdown().await.unwrap();

    assert!(path.exists());
    assert!(dir.path().join("app.log.1").exists());
    assert!(dir.path().join("app.log.2").exists());
    assert!(!dir.path().join("app.log.3").exists());
}
