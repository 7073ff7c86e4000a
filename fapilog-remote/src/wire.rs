use std::collections::BTreeMap;

use fapilog_core::Event;
use serde::Serialize;

use crate::config::{compute_labels, LabelSource};

#[derive(Debug, Serialize)]
pub struct StreamPayload {
    pub stream: BTreeMap<String, String>,
    /// `(timestamp_ns, serialized_line)` pairs, both carried as strings to
    /// match the aggregator wire convention.
    pub values: Vec<(String, String)>,
}

#[derive(Debug, Serialize)]
pub struct BatchPayload {
    pub streams: Vec<StreamPayload>,
}

fn event_timestamp_ns(event: &Event) -> i128 {
    if let Some(raw) = event.get_str(fapilog_core::event::KEY_TIMESTAMP) {
        if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
            return parsed.timestamp_nanos_opt().unwrap_or_default() as i128;
        }
    }
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_nanos() as i128
}

/// Groups events by their resolved label set (§4.6) into the grouped
/// wire format: one "stream" per unique label set, each carrying
/// `(timestamp_ns, line)` pairs.
pub fn group_into_streams(labels: &[(String, LabelSource)], events: &[Event]) -> BatchPayload {
    let mut grouped: Vec<(Vec<(String, String)>, Vec<(String, String)>)> = Vec::new();

    for event in events {
        let label_pairs = compute_labels(labels, event);
        let line = event.to_json_line();
        let ts = event_timestamp_ns(event).to_string();

        match grouped.iter_mut().find(|(key, _)| key == &label_pairs) {
            Some((_, values)) => values.push((ts, line)),
            None => grouped.push((label_pairs, vec![(ts, line)])),
        }
    }

    let streams = grouped
        .into_iter()
        .map(|(labels, values)| StreamPayload {
            stream: labels.into_iter().collect(),
            values,
        })
        .collect();

    BatchPayload { streams }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn groups_events_sharing_a_label_set_into_one_stream() {
        let labels = vec![("level".to_string(), LabelSource::Field("level".to_string()))];
        let mut a = Event::new();
        a.insert("level".to_string(), json!("info"));
        let mut b = Event::new();
        b.insert("level".to_string(), json!("info"));
        let mut c = Event::new();
        c.insert("level".to_string(), json!("error"));

        let payload = group_into_streams(&labels, &[a, b, c]);
        assert_eq!(payload.streams.len(), 2);
        let info_stream = payload.streams.iter().find(|s| s.stream.get("level").map(String::as_str) == Some("info")).unwrap();
        assert_eq!(info_stream.values.len(), 2);
    }
}
