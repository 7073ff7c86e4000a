use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-external-dependency circuit breaker (§3, §9): closed/open/half-open,
/// a failure counter, and a recovery timeout. State is recomputed from
/// elapsed time on every read rather than driven by a background timer,
/// the same style `r2e-rate-limit`'s token bucket refills on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        CircuitBreaker {
            failure_threshold,
            recovery_timeout,
            inner: Mutex::new(Inner {
                failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock().unwrap();
        match inner.opened_at {
            Some(opened_at) if opened_at.elapsed() >= self.recovery_timeout => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
            None => CircuitState::Closed,
        }
    }

    /// Whether a call should be attempted right now.
    pub fn allow(&self) -> bool {
        !matches!(self.state(), CircuitState::Open)
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures += 1;
        if inner.failures >= self.failure_threshold {
            inner.opened_at = Some(Instant::now());
        }
    }
}
