pub mod async_enricher;
pub mod cache;
pub mod circuit;
pub mod metadata;
pub mod processor;
pub mod registry;
pub mod sync_enricher;

pub use async_enricher::{AsyncEnricher, BoxFuture, LifecycleHandle, LifecycleState};
pub use cache::EnricherCache;
pub use circuit::{CircuitBreaker, CircuitState};
pub use metadata::{ConditionContext, EnricherConditions, EnricherMetadata};
pub use processor::AsyncEnricherProcessor;
pub use registry::{EnricherFactory, EnricherKind, EnricherRegistry, Registration};
pub use sync_enricher::{EnrichContext, SyncEnricher};
