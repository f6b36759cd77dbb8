use super::*;

#[test]
fn closed_queue_error_is_detected() {
    let e: Error = QueueError::Closed.into();
    assert!(e.is_closed());
    assert!(!e.is_not_found());
    assert_eq!(e.to_string(), "delta fifo is closed");
}

#[test]
fn not_found_error_carries_key() {
    let e: Error = CacheError::NotFound {
        key: "default/foo".to_string(),
    }
    .into();
    assert!(e.is_not_found());
    assert_eq!(e.to_string(), "Object not found: default/foo");
}

#[test]
fn already_started_names_component() {
    let e = Error::AlreadyStarted {
        component: "DeltaFifo",
    };
    assert_eq!(e.to_string(), "DeltaFifo has already been started");
}

#[test]
fn source_errors_wrap_collaborator_failures() {
    let inner: BoxError = "connection refused".into();
    let e: Error = SourceError::List(inner).into();
    assert_eq!(e.to_string(), "List request failed: connection refused");

    let e: Error = SourceError::WatchClosed.into();
    assert!(matches!(e, Error::Source(SourceError::WatchClosed)));
}
