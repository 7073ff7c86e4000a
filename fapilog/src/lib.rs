//! Structured logging facade for HTTP services (§1-2): event pipeline,
//! enrichment, redaction, a bounded async queue, request-correlation
//! middleware, and pluggable sinks (stdout, rotating file, remote HTTP),
//! wired together behind a single idempotent bootstrap.

pub mod container;
pub mod logger;
pub mod pipeline;
pub mod resource;

pub use container::{Container, EnricherSource, SinkSource};
pub use logger::{configure_logging, Logger};

pub use fapilog_core::error::{ErrorContext, FapilogError};
pub use fapilog_core::{ConsoleFormat, ContextRecord, Event, Level, OverflowStrategy, Settings, SettingsBuilder};
pub use fapilog_enrich::{
    AsyncEnricher, ConditionContext, EnricherConditions, EnricherFactory, EnricherKind,
    EnricherMetadata, EnricherRegistry, LifecycleHandle, LifecycleState, SyncEnricher,
};
pub use fapilog_middleware::{
    generate_span_id, generate_trace_id, propagate_trace_header, CorrelationConfig, CorrelationLayer,
    CorrelationService,
};
pub use fapilog_sinks::{Sink, SinkFactory, SinkRegistry};
