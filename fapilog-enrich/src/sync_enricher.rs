use fapilog_core::{Event, FapilogError};

/// Per-call identifiers threaded through every enricher invocation, the
/// `(logger_handle, method_name, event)` shape from §9.
#[derive(Debug, Clone, Default)]
pub struct EnrichContext {
    pub logger_handle: String,
    pub method_name: String,
    pub environment_tag: Option<String>,
}

/// A synchronous enricher: a plain transform. Failures are caught locally by
/// the registry and downgraded to a debug-level diagnostic; the pipeline
/// continues with the unmodified event (§4.4).
pub trait SyncEnricher: Send + Sync {
    fn enrich(&self, ctx: &EnrichContext, event: &mut Event) -> Result<(), FapilogError>;
}

impl<F> SyncEnricher for F
where
    F: Fn(&EnrichContext, &mut Event) -> Result<(), FapilogError> + Send + Sync,
{
    fn enrich(&self, ctx: &EnrichContext, event: &mut Event) -> Result<(), FapilogError> {
        self(ctx, event)
    }
}
