use fapilog_core::{Event, Level, Settings};
use fapilog_redact::Redactor;
use serde_json::json;

fn settings_with(fields: &[&str], patterns: &[&str]) -> Settings {
    Settings::builder()
        .redact_fields(fields.iter().map(|s| s.to_string()).collect())
        .redact_patterns(patterns.iter().map(|s| s.to_string()).collect())
        .redact_level(Level::Info)
        .build()
        .unwrap()
}

#[test]
fn field_redaction_replaces_nested_and_leaves_siblings() {
    let redactor = Redactor::new(&settings_with(&["user.password", "token"], &[])).unwrap();
    let mut event = Event::new();
    event.insert("level".into(), json!("info"));
    event.insert("user".into(), json!({"password": "p", "email": "e"}));
    event.insert("token".into(), json!("t"));
    event.insert("q".into(), json!(1));

    let redacted = redactor.apply(&event);
    assert_eq!(redacted["user"]["password"], json!("REDACTED"));
    assert_eq!(redacted["user"]["email"], json!("e"));
    assert_eq!(redacted["token"], json!("REDACTED"));
    assert_eq!(redacted["q"], json!(1));
}

#[test]
fn redaction_is_skipped_below_redact_level() {
    let redactor = Redactor::new(&settings_with(&["token"], &[])).unwrap();
    let mut event = Event::new();
    event.insert("level".into(), json!("debug"));
    event.insert("token".into(), json!("t"));

    let unchanged = redactor.apply(&event);
    assert_eq!(unchanged["token"], json!("t"));
}

#[test]
fn unknown_level_is_redacted_fail_safe() {
    let redactor = Redactor::new(&settings_with(&["token"], &[])).unwrap();
    let mut event = Event::new();
    event.insert("token".into(), json!("t"));

    let redacted = redactor.apply(&event);
    assert_eq!(redacted["token"], json!("REDACTED"));
}

#[test]
fn pattern_redaction_scans_nested_strings_only() {
    let redactor = Redactor::new(&settings_with(&[], &[r"\d{4}-\d{4}-\d{4}-\d{4}"])).unwrap();
    let mut event = Event::new();
    event.insert("level".into(), json!("info"));
    event.insert(
        "payload".into(),
        json!({"card": "card 1111-2222-3333-4444 on file", "amount": 42}),
    );

    let redacted = redactor.apply(&event);
    assert_eq!(redacted["payload"]["card"], json!("card REDACTED on file"));
    assert_eq!(redacted["payload"]["amount"], json!(42));
}

#[test]
fn field_redaction_applies_remaining_path_to_each_list_element() {
    let redactor = Redactor::new(&settings_with(&["items.secret"], &[])).unwrap();
    let mut event = Event::new();
    event.insert("level".into(), json!("info"));
    event.insert(
        "items".into(),
        json!([{"secret": "a", "keep": 1}, {"secret": "b", "keep": 2}]),
    );

    let redacted = redactor.apply(&event);
    assert_eq!(redacted["items"][0]["secret"], json!("REDACTED"));
    assert_eq!(redacted["items"][1]["secret"], json!("REDACTED"));
    assert_eq!(redacted["items"][0]["keep"], json!(1));
}

#[test]
fn apply_does_not_mutate_caller_structure() {
    let redactor = Redactor::new(&settings_with(&["token"], &[])).unwrap();
    let mut event = Event::new();
    event.insert("level".into(), json!("info"));
    event.insert("token".into(), json!("t"));

    let _ = redactor.apply(&event);
    assert_eq!(event["token"], json!("t"));
}
