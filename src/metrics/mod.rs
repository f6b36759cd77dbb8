use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tracing::warn;

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref DELTAS_QUEUED: IntCounterVec = IntCounterVec::new(
        Opts::new("informer_deltas_queued", "Deltas accepted by the delta fifo"),
        &["delta_type"]
    )
    .expect("metric can not be created");

    pub static ref PENDING_KEYS: IntGauge = IntGauge::new(
        "informer_pending_keys",
        "Keys with unpopped deltas in the delta fifo"
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS_DISPATCHED: IntCounterVec = IntCounterVec::new(
        Opts::new("informer_notifications_dispatched", "Notifications handed to listeners"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref REGISTERED_LISTENERS: IntGauge = IntGauge::new(
        "informer_registered_listeners",
        "Listeners currently registered on shared informers"
    )
    .expect("metric can not be created");

    pub static ref RESYNC_ROUNDS: IntCounter = IntCounter::new(
        "informer_resync_rounds",
        "Resync rounds started by the resync coordinator"
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_ERRORS: IntCounter = IntCounter::new(
        "informer_reconcile_errors",
        "Reconcile calls that returned an error"
    )
    .expect("metric can not be created");
}

/// Register every informer collector into `registry`.
///
/// Collectors are process-wide; registering them twice into the same
/// registry is reported and ignored.
pub fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(DELTAS_QUEUED.clone()),
        Box::new(PENDING_KEYS.clone()),
        Box::new(NOTIFICATIONS_DISPATCHED.clone()),
        Box::new(REGISTERED_LISTENERS.clone()),
        Box::new(RESYNC_ROUNDS.clone()),
        Box::new(RECONCILE_ERRORS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            warn!("collector can not be registered: {:?}", e);
        }
    }
}
