//! Pattern and field-path based redaction (C9), with level-gated activation.

use fapilog_core::error::{ErrorContext, FapilogError};
use fapilog_core::{Event, Level, Settings};
use regex::Regex;
use serde_json::Value;

/// Safely obscures sensitive values before rendering. Composed of pattern
/// redaction (regex over every string value) and field redaction (dotted
/// paths into the event), gated by `redact_level`.
#[derive(Debug, Clone)]
pub struct Redactor {
    patterns: Vec<Regex>,
    field_paths: Vec<Vec<String>>,
    replacement: String,
    redact_level: Level,
}

impl Redactor {
    pub fn new(settings: &Settings) -> Result<Self, FapilogError> {
        let patterns = settings
            .redact_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|err| FapilogError::Redaction {
                    context: ErrorContext::new("redactor", "compile_pattern")
                        .with_offending_value(pattern.clone())
                        .with_config_key("REDACT_PATTERNS"),
                    detail: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let field_paths = settings
            .redact_fields
            .iter()
            .map(|path| path.split('.').map(str::to_string).collect())
            .collect();

        Ok(Redactor {
            patterns,
            field_paths,
            replacement: settings.redact_replacement.clone(),
            redact_level: settings.redact_level,
        })
    }

    /// Whether redaction runs for an event at `level`. Events with no level
    /// (logged outside a request or before pipeline normalization) default
    /// to redact — fail-safe when unknown (§4.10, §9).
    pub fn should_redact(&self, level: Option<Level>) -> bool {
        match level {
            Some(level) => level >= self.redact_level,
            None => true,
        }
    }

    /// Applies gated redaction, producing a new `Event`. The input is never
    /// mutated: a clone is taken up front so upstream callers' structures
    /// are unaffected regardless of what this returns.
    pub fn apply(&self, event: &Event) -> Event {
        if !self.should_redact(event.level()) {
            return event.clone();
        }

        let mut value = Value::Object(event.clone().into_map());
        redact_patterns(&mut value, &self.patterns, &self.replacement);
        for path in &self.field_paths {
            redact_path(&mut value, path, &self.replacement);
        }

        match value {
            Value::Object(map) => Event::from_map(map),
            _ => event.clone(),
        }
    }
}

fn redact_patterns(value: &mut Value, patterns: &[Regex], replacement: &str) {
    match value {
        Value::String(s) => {
            for pattern in patterns {
                if pattern.is_match(s) {
                    *s = pattern.replace_all(s, replacement).into_owned();
                }
            }
        }
        Value::Object(map) => {
            for v in map.values_mut() {
                redact_patterns(v, patterns, replacement);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                redact_patterns(v, patterns, replacement);
            }
        }
        _ => {}
    }
}

/// A path component matches map keys; traversal into a list applies the
/// remaining path (unconsumed) to each element (§4.10).
fn redact_path(value: &mut Value, path: &[String], replacement: &str) {
    if path.is_empty() {
        *value = Value::String(replacement.to_string());
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_path(item, path, replacement);
            }
        }
        Value::Object(map) => {
            if let Some(child) = map.get_mut(&path[0]) {
                redact_path(child, &path[1..], replacement);
            }
        }
        _ => {}
    }
}
