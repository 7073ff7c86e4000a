use std::time::Duration;

use fapilog_enrich::{CircuitBreaker, CircuitState};

#[test]
fn opens_after_threshold_failures() {
    let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
    assert!(breaker.allow());
    breaker.record_failure();
    assert!(breaker.allow());
    breaker.record_failure();
    assert!(!breaker.allow());
}

#[test]
fn half_opens_after_recovery_timeout() {
    let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
    breaker.record_failure();
    assert!(!breaker.allow());
    std::thread::sleep(Duration::from_millis(15));
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert!(breaker.allow());
}

#[test]
fn success_resets_to_closed() {
    let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
    breaker.record_failure();
    breaker.record_success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}
