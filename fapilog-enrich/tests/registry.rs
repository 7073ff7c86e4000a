use std::sync::Arc;

use fapilog_core::{Event, FapilogError};
use fapilog_enrich::{EnricherKind, EnricherMetadata, EnricherRegistry, SyncEnricher};

fn noop() -> EnricherKind {
    EnricherKind::Sync(Arc::new(|_: &fapilog_enrich::EnrichContext, _: &mut Event| Ok(())))
}

#[test]
fn resolve_order_groups_independent_enrichers_into_one_level() {
    let registry = EnricherRegistry::new();
    registry.register(EnricherMetadata::new("a", 10), noop()).unwrap();
    registry.register(EnricherMetadata::new("b", 5), noop()).unwrap();
    let levels = registry
        .resolve_order(&["a".to_string(), "b".to_string()])
        .unwrap();
    assert_eq!(levels, vec![vec!["b".to_string(), "a".to_string()]]);
}

#[test]
fn resolve_order_respects_dependencies_across_levels() {
    let registry = EnricherRegistry::new();
    registry.register(EnricherMetadata::new("a", 10), noop()).unwrap();
    registry
        .register(
            EnricherMetadata::new("b", 20).with_dependencies(vec!["a".to_string()]),
            noop(),
        )
        .unwrap();
    let levels = registry
        .resolve_order(&["a".to_string(), "b".to_string()])
        .unwrap();
    assert_eq!(levels, vec![vec!["a".to_string()], vec!["b".to_string()]]);
}

#[test]
fn resolve_order_ties_broken_by_priority_then_name() {
    let registry = EnricherRegistry::new();
    registry.register(EnricherMetadata::new("z", 10), noop()).unwrap();
    registry.register(EnricherMetadata::new("a", 10), noop()).unwrap();
    registry.register(EnricherMetadata::new("m", 5), noop()).unwrap();
    let levels = registry
        .resolve_order(&["z".to_string(), "a".to_string(), "m".to_string()])
        .unwrap();
    assert_eq!(
        levels,
        vec![vec!["m".to_string(), "a".to_string(), "z".to_string()]]
    );
}

#[test]
fn resolve_order_reports_the_cycle() {
    let registry = EnricherRegistry::new();
    registry
        .register(
            EnricherMetadata::new("a", 1).with_dependencies(vec!["b".to_string()]),
            noop(),
        )
        .unwrap();
    registry
        .register(
            EnricherMetadata::new("b", 1).with_dependencies(vec!["a".to_string()]),
            noop(),
        )
        .unwrap();
    let err = registry
        .resolve_order(&["a".to_string(), "b".to_string()])
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("a"));
    assert!(message.contains("b"));
    assert!(message.contains("->"));
}

#[test]
fn re_registering_identical_implementation_is_a_no_op() {
    let registry = EnricherRegistry::new();
    let implementation: Arc<dyn SyncEnricher> =
        Arc::new(|_: &fapilog_enrich::EnrichContext, _: &mut Event| Ok(()));
    registry
        .register(EnricherMetadata::new("a", 1), EnricherKind::Sync(implementation.clone()))
        .unwrap();
    assert!(registry
        .register(EnricherMetadata::new("a", 1), EnricherKind::Sync(implementation))
        .is_ok());
}

#[test]
fn re_registering_different_implementation_is_a_configuration_error() {
    let registry = EnricherRegistry::new();
    registry.register(EnricherMetadata::new("a", 1), noop()).unwrap();
    let err = registry.register(EnricherMetadata::new("a", 1), noop()).unwrap_err();
    assert!(matches!(err, FapilogError::Configuration { .. }));
}
