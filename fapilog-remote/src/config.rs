use std::time::Duration;

use fapilog_core::uri::ParsedUri;
use fapilog_core::Event;

/// Where a stream label's value comes from (§4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    Literal(String),
    Field(String),
}

/// Construction parameters for the remote aggregator sink.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub auth_headers: Vec<(String, String)>,
    pub tenant_header: Option<(String, String)>,
    pub labels: Vec<(String, LabelSource)>,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub backoff_base_s: f64,
}

impl RemoteConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        RemoteConfig {
            endpoint: endpoint.into(),
            auth_headers: Vec::new(),
            tenant_header: None,
            labels: default_labels(),
            batch_size: 100,
            flush_interval: Duration::from_millis(500),
            max_retries: 3,
            backoff_base_s: 1.0,
        }
    }

    pub fn with_auth_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth_headers.push((name.into(), value.into()));
        self
    }

    pub fn with_tenant_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tenant_header = Some((name.into(), value.into()));
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, source: LabelSource) -> Self {
        let key = key.into();
        self.labels.retain(|(k, _)| k != &key);
        self.labels.push((key, source));
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_base_s(mut self, backoff_base_s: f64) -> Self {
        self.backoff_base_s = backoff_base_s;
        self
    }

    /// `remote://host:port/path?batch_size=..&flush_interval_s=..&max_retries=..&backoff_base_s=..&tenant=..&auth=..`
    pub fn from_uri(uri: &ParsedUri) -> Self {
        let host = uri.host.as_deref().unwrap_or("localhost");
        let port = uri.port.map(|p| format!(":{p}")).unwrap_or_default();
        let path = uri.path.as_deref().unwrap_or("");
        let endpoint = format!("https://{host}{port}{path}");

        let mut config = RemoteConfig::new(endpoint);
        if let Some(batch_size) = uri.get_i64("batch_size") {
            config = config.with_batch_size(batch_size.max(1) as usize);
        }
        if let Some(secs) = uri.get_f64("flush_interval_s") {
            config = config.with_flush_interval(Duration::from_secs_f64(secs.max(0.001)));
        }
        if let Some(retries) = uri.get_i64("max_retries") {
            config = config.with_max_retries(retries.max(0) as u32);
        }
        if let Some(base) = uri.get_f64("backoff_base_s") {
            config = config.with_backoff_base_s(base.max(0.0));
        }
        if let Some(tenant) = uri.get("tenant") {
            config = config.with_tenant_header("X-Scope-OrgID", tenant);
        }
        if let Some(auth) = uri.get("auth") {
            config = config.with_auth_header("Authorization", auth);
        }
        config
    }
}

fn default_labels() -> Vec<(String, LabelSource)> {
    vec![
        ("app".to_string(), LabelSource::Field("service".to_string())),
        ("env".to_string(), LabelSource::Field("environment".to_string())),
        ("level".to_string(), LabelSource::Field("level".to_string())),
    ]
}

/// Lowercases a label key and replaces any character outside `[a-z0-9_]`
/// with `_` (§4.6).
pub fn sanitize_key(key: &str) -> String {
    key.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' { c } else { '_' })
        .collect()
}

fn stringify_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Resolves one event's label set against the configured mapping. Missing
/// or empty values are replaced by the literal `"unknown"` (§4.6).
pub fn compute_labels(labels: &[(String, LabelSource)], event: &Event) -> Vec<(String, String)> {
    labels
        .iter()
        .map(|(key, source)| {
            let raw = match source {
                LabelSource::Literal(value) => Some(value.clone()),
                LabelSource::Field(field) => event.get(field).and_then(stringify_value),
            };
            let value = match raw {
                Some(v) if !v.is_empty() => v,
                _ => "unknown".to_string(),
            };
            (sanitize_key(key), value)
        })
        .collect()
}
