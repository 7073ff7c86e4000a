use std::io::Write;

use fapilog_core::uri::ParsedUri;
use fapilog_core::{ConsoleFormat, Event, FapilogError};

use crate::sink::{BoxFuture, Sink};

/// Writes one serialized event per line to standard output (§4.5).
#[derive(Debug)]
pub struct StdoutSink {
    format: ConsoleFormat,
}

impl StdoutSink {
    pub fn new(format: ConsoleFormat) -> Self {
        StdoutSink { format }
    }

    pub fn from_uri(uri: &ParsedUri) -> Self {
        let format = uri
            .host
            .as_deref()
            .or_else(|| uri.get("format"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(ConsoleFormat::Json);
        StdoutSink::new(format)
    }

    fn render(&self, event: &Event) -> String {
        match self.format {
            ConsoleFormat::Pretty => render_pretty(event),
            ConsoleFormat::Json | ConsoleFormat::Auto => event.to_json_line(),
        }
    }
}

fn render_pretty(event: &Event) -> String {
    let level = event.get_str("level").unwrap_or("info");
    let message = event.get_str("event").unwrap_or("");
    let mut extras: Vec<String> = event
        .iter()
        .filter(|(k, _)| k.as_str() != "level" && k.as_str() != "event")
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    extras.sort();
    if extras.is_empty() {
        format!("[{level}] {message}")
    } else {
        format!("[{level}] {message} {}", extras.join(" "))
    }
}

impl Sink for StdoutSink {
    fn write(&self, event: &Event) -> BoxFuture<'_, Result<(), FapilogError>> {
        let line = self.render(event);
        Box::pin(async move {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{line}")?;
            Ok(())
        })
    }
}
