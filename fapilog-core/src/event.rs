use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};

/// Key for the free-form short message, renamed from the call site's
/// `message`/`msg` argument during the pipeline's third step.
pub const KEY_EVENT: &str = "event";
pub const KEY_TIMESTAMP: &str = "timestamp";
pub const KEY_LEVEL: &str = "level";
pub const KEY_TRACE_ID: &str = "trace_id";
pub const KEY_SPAN_ID: &str = "span_id";
pub const KEY_LATENCY_MS: &str = "latency_ms";
pub const KEY_STATUS_CODE: &str = "status_code";
pub const KEY_REQ_BYTES: &str = "req_bytes";
pub const KEY_RES_BYTES: &str = "res_bytes";
pub const KEY_USER_AGENT: &str = "user_agent";
pub const KEY_METHOD: &str = "method";
pub const KEY_PATH: &str = "path";
pub const KEY_CLIENT_IP: &str = "client_ip";

/// A mapping from string keys to JSON-representable values, mutated in place
/// along the pipeline.
///
/// Wraps `serde_json::Map` the way `R2eConfig<T>` wraps its inner value map,
/// giving callers direct `Map` ergonomics through `Deref`/`DerefMut` while
/// keeping the reserved-key helpers (`set_if_absent`, `get_str`) front and
/// center.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event(Map<String, Value>);

impl Event {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Set `key` to `value` only if the event does not already carry it.
    /// Enrichers must call this rather than plain `insert` so that
    /// user-populated fields are never overwritten (§4.3).
    pub fn set_if_absent(&mut self, key: &str, value: Value) {
        if !self.0.contains_key(key) {
            self.0.insert(key.to_string(), value);
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn level(&self) -> Option<crate::Level> {
        self.get_str(KEY_LEVEL).and_then(|s| s.parse().ok())
    }

    pub fn rename_message_key(&mut self, message_key: &str) {
        if message_key == KEY_EVENT {
            return;
        }
        if let Some(value) = self.0.remove(message_key) {
            self.0.entry(KEY_EVENT.to_string()).or_insert(value);
        }
    }

    pub fn to_json_line(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Deref for Event {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Event {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Map<String, Value>> for Event {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_if_absent_never_overwrites() {
        let mut event = Event::new();
        event.insert("k".to_string(), Value::from(1));
        event.set_if_absent("k", Value::from(2));
        assert_eq!(event.get("k"), Some(&Value::from(1)));
    }

    #[test]
    fn rename_message_key_moves_value_once() {
        let mut event = Event::new();
        event.insert("msg".to_string(), Value::from("hello"));
        event.rename_message_key("msg");
        assert_eq!(event.get_str(KEY_EVENT), Some("hello"));
        assert!(!event.contains_key("msg"));
    }

    #[test]
    fn rename_message_key_is_noop_for_event_key() {
        let mut event = Event::new();
        event.insert(KEY_EVENT.to_string(), Value::from("hi"));
        event.rename_message_key(KEY_EVENT);
        assert_eq!(event.get_str(KEY_EVENT), Some("hi"));
    }
}
