use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::HandlerReconciler;
use super::ReconcileEvent;
use super::Reconciler;
use super::ResyncTrigger;
use crate::metrics::RECONCILE_ERRORS;
use crate::DeltaFifo;
use crate::DeltaFifoEvent;
use crate::Error;
use crate::InformerConfig;
use crate::KeyFunc;
use crate::ListerWatcher;
use crate::Object;
use crate::Reflector;
use crate::ResourceEventHandler;
use crate::Result;
use crate::Signal;
use crate::Store;
use crate::ThreadSafeStore;

/// Drives one delta fifo, one reflector and one reconciler.
///
/// `run` joins four loops under one cancellation scope:
///
/// ```text
/// fifo.run      - owns the pending deltas
/// reflector.run - List+Watch -> fifo
/// event loop    - NewDeltas(key) -> pop(key) -> reconcile
/// resync loop   - tick -> fifo.resync(store.all())   (only with a trigger)
/// ```
pub struct Controller<K: Object> {
    fifo: Arc<DeltaFifo<K>>,
    reflector: Reflector<K>,
    store: Arc<dyn Store<K>>,
    reconciler: Arc<dyn Reconciler<K>>,
    resync: Mutex<Option<ResyncTrigger>>,
    /// Held while a popped key is reconciled and while a resync snapshot is
    /// taken, so a resync never re-delivers a value older than an in-flight
    /// change.
    processing: tokio::sync::Mutex<()>,
    started: AtomicBool,
}

impl<K: Object> std::fmt::Debug for Controller<K> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("fifo", &self.fifo)
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl<K: Object> Controller<K> {
    /// Periodic resync is wired from `config.controller.resync_period_ms`.
    pub fn new(
        lister_watcher: Arc<dyn ListerWatcher<K>>,
        key_func: KeyFunc<K>,
        store: Arc<dyn Store<K>>,
        reconciler: Arc<dyn Reconciler<K>>,
        config: &InformerConfig,
    ) -> Self {
        let fifo = Arc::new(DeltaFifo::new(key_func, &config.queue));
        let reflector = Reflector::new(lister_watcher, fifo.clone());
        Self {
            fifo,
            reflector,
            store,
            reconciler,
            resync: Mutex::new(config.controller.resync_period().map(ResyncTrigger::Interval)),
            processing: tokio::sync::Mutex::new(()),
            started: AtomicBool::new(false),
        }
    }

    /// Replace the resync trigger. Must be called before `run`.
    pub fn with_resync(
        self,
        trigger: ResyncTrigger,
    ) -> Self {
        *self.resync.lock() = Some(trigger);
        self
    }

    pub fn store(&self) -> Arc<dyn Store<K>> {
        self.store.clone()
    }

    pub fn fifo(&self) -> &Arc<DeltaFifo<K>> {
        &self.fifo
    }

    /// True once the initial list has been queued
    pub fn has_synced(&self) -> bool {
        self.fifo.has_synced()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Run until `cancel` fires or the reflector fails.
    ///
    /// Every loop is joined before returning. A reflector failure cancels the
    /// other loops and is returned. May be called once.
    pub async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyStarted {
                component: "Controller",
            });
        }

        let scope = cancel.child_token();
        let trigger = self.resync.lock().take();
        let events = self.fifo.events();
        debug!(resync = trigger.is_some(), "controller started");

        let (fifo_result, reflector_result, (), ()) = tokio::join!(
            self.fifo.run(scope.clone()),
            async {
                let result = self.reflector.run(scope.clone()).await;
                if let Err(e) = &result {
                    error!("reflector stopped: {}", e);
                }
                // the fifo and both loops follow the reflector down
                scope.cancel();
                result
            },
            self.process_events(events, scope.clone()),
            self.resync_loop(trigger, scope.clone()),
        );

        debug!("controller stopped");
        fifo_result?;
        reflector_result
    }

    async fn process_events(
        &self,
        mut events: BoxStream<'static, DeltaFifoEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.next() => event,
            };
            let Some(event) = event else {
                break;
            };
            trace!(?event, "controller event");

            let _processing = self.processing.lock().await;
            let event = match event {
                DeltaFifoEvent::Populated => ReconcileEvent::Populated,
                DeltaFifoEvent::Resynced => ReconcileEvent::Resynced,
                DeltaFifoEvent::NewDeltas(key) => match self.fifo.pop(&key).await {
                    Ok(deltas) => ReconcileEvent::NewDeltas(deltas),
                    Err(e) if e.is_closed() => break,
                    Err(e) => {
                        warn!(%key, "failed to pop deltas: {}", e);
                        continue;
                    }
                },
            };

            if let Err(e) = self.reconciler.reconcile(event).await {
                RECONCILE_ERRORS.inc();
                warn!("reconcile failed: {}", e);
            }
        }
        debug!("controller event loop stopped");
    }

    async fn resync_loop(
        &self,
        trigger: Option<ResyncTrigger>,
        cancel: CancellationToken,
    ) {
        let Some(trigger) = trigger else {
            return;
        };

        // a resync before the initial list would race the populate batch
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = self.fifo.wait_synced() => {}
        }

        let mut ticker = trigger.into_ticker();
        loop {
            let tick = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                tick = ticker.tick() => tick,
            };
            if tick.is_none() {
                debug!("resync trigger closed");
                break;
            }

            let result = {
                let _processing = self.processing.lock().await;
                let objs = self.store.all();
                debug!(count = objs.len(), "controller resync");
                self.fifo.resync(objs).await
            };
            match result {
                Ok(()) => {}
                Err(e) if e.is_closed() => break,
                Err(e) => warn!("resync failed: {}", e),
            }
        }
        debug!("controller resync loop stopped");
    }
}

/// Controller with the default [`HandlerReconciler`] over a fresh
/// [`ThreadSafeStore`].
///
/// Returns the controller and the signal fired once the initial list has
/// reached `handler`.
pub fn new_informer<K: Object>(
    lister_watcher: Arc<dyn ListerWatcher<K>>,
    key_func: KeyFunc<K>,
    handler: Arc<dyn ResourceEventHandler<K>>,
    config: &InformerConfig,
) -> (Controller<K>, Signal) {
    let store: Arc<dyn Store<K>> = Arc::new(ThreadSafeStore::new(key_func.clone()));
    let reconciler = HandlerReconciler::new(store.clone(), handler);
    let synced = reconciler.synced();
    let controller = Controller::new(lister_watcher, key_func, store, Arc::new(reconciler), config);
    (controller, synced)
}
