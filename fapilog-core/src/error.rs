use std::fmt;

/// Structured context attached to every error (§7): the affected subsystem,
/// the operation in progress, the offending value (if any, pre-filtered for
/// sensitive content by the caller), and the configuration key (if the error
/// originated from settings or a URI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub subsystem: &'static str,
    pub operation: &'static str,
    pub offending_value: Option<String>,
    pub config_key: Option<String>,
}

impl ErrorContext {
    pub fn new(subsystem: &'static str, operation: &'static str) -> Self {
        Self {
            subsystem,
            operation,
            offending_value: None,
            config_key: None,
        }
    }

    pub fn with_offending_value(mut self, value: impl Into<String>) -> Self {
        self.offending_value = Some(value.into());
        self
    }

    pub fn with_config_key(mut self, key: impl Into<String>) -> Self {
        self.config_key = Some(key.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.subsystem, self.operation)?;
        if let Some(key) = &self.config_key {
            write!(f, " (key={key})")?;
        }
        if let Some(value) = &self.offending_value {
            write!(f, " (value={value})")?;
        }
        Ok(())
    }
}

/// Error taxonomy by concept (§7), not by originating type: configuration,
/// sink, queue, middleware, redaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FapilogError {
    Configuration {
        context: ErrorContext,
        constraint: String,
    },
    Sink {
        context: ErrorContext,
        detail: String,
    },
    Queue {
        context: ErrorContext,
        detail: String,
    },
    Middleware {
        context: ErrorContext,
        detail: String,
    },
    Redaction {
        context: ErrorContext,
        detail: String,
    },
    /// Re-configuring an already-configured container with incompatible
    /// settings (§4.9's documented "fails explicitly" branch).
    AlreadyConfigured,
}

impl FapilogError {
    pub fn sink(context: ErrorContext, detail: impl Into<String>) -> Self {
        FapilogError::Sink {
            context,
            detail: detail.into(),
        }
    }

    pub fn queue(context: ErrorContext, detail: impl Into<String>) -> Self {
        FapilogError::Queue {
            context,
            detail: detail.into(),
        }
    }

    pub fn middleware(context: ErrorContext, detail: impl Into<String>) -> Self {
        FapilogError::Middleware {
            context,
            detail: detail.into(),
        }
    }

    pub fn redaction(context: ErrorContext, detail: impl Into<String>) -> Self {
        FapilogError::Redaction {
            context,
            detail: detail.into(),
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            FapilogError::Configuration { context, .. }
            | FapilogError::Sink { context, .. }
            | FapilogError::Queue { context, .. }
            | FapilogError::Middleware { context, .. }
            | FapilogError::Redaction { context, .. } => Some(context),
            FapilogError::AlreadyConfigured => None,
        }
    }
}

impl fmt::Display for FapilogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FapilogError::Configuration { context, constraint } => {
                write!(f, "configuration error in {context}: expected {constraint}")
            }
            FapilogError::Sink { context, detail } => {
                write!(f, "sink error in {context}: {detail}")
            }
            FapilogError::Queue { context, detail } => {
                write!(f, "queue error in {context}: {detail}")
            }
            FapilogError::Middleware { context, detail } => {
                write!(f, "middleware error in {context}: {detail}")
            }
            FapilogError::Redaction { context, detail } => {
                write!(f, "redaction error in {context}: {detail}")
            }
            FapilogError::AlreadyConfigured => {
                write!(f, "configure_logging called twice with incompatible settings")
            }
        }
    }
}

impl std::error::Error for FapilogError {}

impl From<std::io::Error> for FapilogError {
    fn from(err: std::io::Error) -> Self {
        FapilogError::Sink {
            context: ErrorContext::new("sink", "io"),
            detail: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_subsystem_and_operation() {
        let err = FapilogError::Configuration {
            context: ErrorContext::new("settings", "parse_level")
                .with_config_key("FAPILOG_LEVEL")
                .with_offending_value("nope"),
            constraint: "one of debug|info|warning|error|critical".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("settings::parse_level"));
        assert!(message.contains("FAPILOG_LEVEL"));
        assert!(message.contains("nope"));
    }
}
