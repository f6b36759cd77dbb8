use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use tracing::warn;

use crate::apply_delta;
use crate::metrics::NOTIFICATIONS_DISPATCHED;
use crate::Deltas;
use crate::Object;
use crate::ResourceEventHandler;
use crate::Result;
use crate::Signal;
use crate::Store;

/// Unit of work handed to a [`Reconciler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent<K> {
    /// The initial list has been queued
    Populated,
    /// A resync batch has been queued
    Resynced,
    /// Everything pending for one key, in submission order
    NewDeltas(Deltas<K>),
}

/// Consumer of the controller's event loop.
///
/// Calls are serial: the next event is popped only after the previous
/// reconcile returned. An error is logged and counted; it never stops the loop.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Reconciler<K: Object>: Send + Sync + 'static {
    async fn reconcile(
        &self,
        event: ReconcileEvent<K>,
    ) -> Result<()>;
}

/// Default reconciler: applies deltas to a store and calls one handler.
pub struct HandlerReconciler<K: Object> {
    store: Arc<dyn Store<K>>,
    handler: Arc<dyn ResourceEventHandler<K>>,
    synced: Signal,
}

impl<K: Object> HandlerReconciler<K> {
    pub fn new(
        store: Arc<dyn Store<K>>,
        handler: Arc<dyn ResourceEventHandler<K>>,
    ) -> Self {
        Self {
            store,
            handler,
            synced: Signal::new(),
        }
    }

    /// Fires once the initial list has been delivered to the handler
    pub fn synced(&self) -> Signal {
        self.synced.clone()
    }
}

#[async_trait]
impl<K: Object> Reconciler<K> for HandlerReconciler<K> {
    async fn reconcile(
        &self,
        event: ReconcileEvent<K>,
    ) -> Result<()> {
        match event {
            ReconcileEvent::Populated => {
                if self.synced.fire() {
                    debug!("handler reconciler synced");
                }
                Ok(())
            }
            ReconcileEvent::Resynced => Ok(()),
            ReconcileEvent::NewDeltas(deltas) => {
                let key = deltas.key().to_string();
                let mut first_error = None;
                for delta in deltas {
                    match apply_delta(self.store.as_ref(), &key, delta) {
                        Ok(notification) => {
                            notification.dispatch(self.handler.as_ref());
                            NOTIFICATIONS_DISPATCHED
                                .with_label_values(&[notification.kind()])
                                .inc();
                        }
                        Err(e) => {
                            warn!(%key, "failed to apply delta: {}", e);
                            first_error.get_or_insert(e);
                        }
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
        }
    }
}
