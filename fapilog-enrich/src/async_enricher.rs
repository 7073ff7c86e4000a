use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use fapilog_core::Event;

use crate::sync_enricher::EnrichContext;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Async enricher lifecycle state machine (§9): `created → started →
/// running → stopping → stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Started,
    Running,
    Stopping,
    Stopped,
}

impl LifecycleState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => LifecycleState::Created,
            1 => LifecycleState::Started,
            2 => LifecycleState::Running,
            3 => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Created => 0,
            LifecycleState::Started => 1,
            LifecycleState::Running => 2,
            LifecycleState::Stopping => 3,
            LifecycleState::Stopped => 4,
        }
    }
}

/// An asynchronous enricher with a managed lifecycle: `startup`, `shutdown`,
/// `health_check`, `enrich_async` (§4.4). The registry wraps instances of
/// this trait to run under the shared async processor; an unhealthy
/// enricher is skipped, not removed from the registry (§9).
pub trait AsyncEnricher: Send + Sync {
    fn startup(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn shutdown(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn health_check(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }

    /// Enrich `event`, returning the (possibly unchanged) event. Errors are
    /// reported by returning the event unmodified; the processor's circuit
    /// breaker and cache wrap this call, not the implementation.
    fn enrich_async<'a>(&'a self, ctx: &'a EnrichContext, event: Event) -> BoxFuture<'a, Event>;
}

/// Tracks one enricher's lifecycle state and health flag, shared by the
/// registry and the async processor.
pub struct LifecycleHandle {
    state: AtomicU8,
    healthy: AtomicBool,
}

impl Default for LifecycleHandle {
    fn default() -> Self {
        LifecycleHandle {
            state: AtomicU8::new(LifecycleState::Created.as_u8()),
            healthy: AtomicBool::new(true),
        }
    }
}

impl LifecycleHandle {
    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: LifecycleState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }
}
