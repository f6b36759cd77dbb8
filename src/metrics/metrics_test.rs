use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("test".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    DELTAS_QUEUED.with_label_values(&["Added"]).inc();
    RESYNC_ROUNDS.inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"test_informer_deltas_queued"),
        "Missing test_informer_deltas_queued"
    );
    assert!(
        metric_names.contains(&"test_informer_resync_rounds"),
        "Missing test_informer_resync_rounds"
    );
}

#[test]
fn test_double_registration_is_ignored() {
    let registry = create_test_registry();
    register_custom_metrics(&registry);
    RECONCILE_ERRORS.inc();
    assert!(!registry.gather().is_empty());
}

#[test]
fn test_counter_increment() {
    let before = NOTIFICATIONS_DISPATCHED.with_label_values(&["add"]).get();
    NOTIFICATIONS_DISPATCHED.with_label_values(&["add"]).inc();
    assert!(NOTIFICATIONS_DISPATCHED.with_label_values(&["add"]).get() > before);
}
