use std::sync::Arc;

use dashmap::DashMap;
use fapilog_core::error::{ErrorContext, FapilogError};
use fapilog_core::uri::{self, validate_scheme};

use crate::sink::Sink;

/// Builds a [`Sink`] from its URI's query parameters once the scheme is
/// dispatched to the right factory.
pub trait SinkFactory: Send + Sync {
    fn create(&self, uri: &uri::ParsedUri) -> Result<Arc<dyn Sink>, FapilogError>;
}

impl<F> SinkFactory for F
where
    F: Fn(&uri::ParsedUri) -> Result<Arc<dyn Sink>, FapilogError> + Send + Sync,
{
    fn create(&self, uri: &uri::ParsedUri) -> Result<Arc<dyn Sink>, FapilogError> {
        self(uri)
    }
}

/// Maps URI schemes to sink factories (§4.5). One registry is owned per
/// configured logger; there is no process-wide global, mirroring the
/// enricher registry's per-instance ownership.
#[derive(Default)]
pub struct SinkRegistry {
    factories: DashMap<String, Arc<dyn SinkFactory>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sink(&self, scheme: &str, factory: Arc<dyn SinkFactory>) -> Result<(), FapilogError> {
        validate_scheme(scheme)?;
        if self.factories.contains_key(scheme) {
            return Err(FapilogError::Configuration {
                context: ErrorContext::new("sink_registry", "register_sink")
                    .with_offending_value(scheme),
                constraint: format!("a sink factory is already registered for scheme \"{scheme}\""),
            });
        }
        self.factories.insert(scheme.to_string(), factory);
        Ok(())
    }

    pub fn create_from_uri(&self, raw_uri: &str) -> Result<Arc<dyn Sink>, FapilogError> {
        let parsed = uri::parse(raw_uri)?;
        let factory = self.factories.get(&parsed.scheme).ok_or_else(|| FapilogError::Configuration {
            context: ErrorContext::new("sink_registry", "create_from_uri")
                .with_offending_value(&parsed.scheme),
            constraint: format!("no sink factory registered for scheme \"{}\"", parsed.scheme),
        })?;
        factory.create(&parsed)
    }

    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.factories.contains_key(scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stdout::StdoutSink;

    #[test]
    fn creates_sink_via_registered_factory() {
        let registry = SinkRegistry::new();
        registry
            .register_sink("stdout", Arc::new(|uri: &uri::ParsedUri| {
                Ok(Arc::new(StdoutSink::from_uri(uri)) as Arc<dyn Sink>)
            }))
            .unwrap();

        let sink = registry.create_from_uri("stdout://json");
        assert!(sink.is_ok());
    }

    #[test]
    fn unknown_scheme_fails_explicitly() {
        let registry = SinkRegistry::new();
        let err = registry.create_from_uri("mystery://x").unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn duplicate_scheme_registration_fails() {
        let registry = SinkRegistry::new();
        let factory: Arc<dyn SinkFactory> = Arc::new(|uri: &uri::ParsedUri| {
            Ok(Arc::new(StdoutSink::from_uri(uri)) as Arc<dyn Sink>)
        });
        registry.register_sink("stdout", factory.clone()).unwrap();
        assert!(registry.register_sink("stdout", factory).is_err());
    }
}
