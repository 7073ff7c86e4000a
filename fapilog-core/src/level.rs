use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorContext, FapilogError};

/// The five-level enumeration from §3. Ordered `Debug < Info < Warning < Error
/// < Critical` so that `level >= redact_level` comparisons (§4.10) use plain
/// `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = FapilogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" | "fatal" => Ok(Level::Critical),
            other => Err(FapilogError::Configuration {
                context: ErrorContext::new("settings", "parse_level")
                    .with_offending_value(other)
                    .with_config_key("level"),
                constraint: "one of debug|info|warning|error|critical".to_string(),
            }),
        }
    }
}
