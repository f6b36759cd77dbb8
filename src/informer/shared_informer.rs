//! Shared informer
//!
//! One List+Watch, one cache and one controller fanned out to any number of
//! listeners that come and go while the informer runs.
//!
//! ```text
//! Controller ── reconcile ──> SharedState ── broadcast ──> Listener 1..N
//!     ^                          (block_deltas)                 │
//!     └── tick ── ResyncCoordinator <── resync requests ────────┘
//! ```
//!
//! Delta application and late-join replay both run under `block_deltas`, so a
//! listener joining at any point sees the cache exactly once: either in the
//! replay or through the live notifications that follow it.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use super::registry::send_all;
use super::Audience;
use super::HandlerOptions;
use super::Listener;
use super::ListenerHandle;
use super::ListenerId;
use super::Registry;
use super::ResyncCoordinator;
use crate::apply_delta;
use crate::metrics::REGISTERED_LISTENERS;
use crate::utils::async_task::join_tasks;
use crate::utils::async_task::spawn_task;
use crate::Controller;
use crate::DeltaType;
use crate::Error;
use crate::InformerConfig;
use crate::KeyFunc;
use crate::ListerWatcher;
use crate::Notification;
use crate::Object;
use crate::ReconcileEvent;
use crate::Reconciler;
use crate::ResourceEventHandler;
use crate::Result;
use crate::ResyncTrigger;
use crate::Signal;
use crate::Store;
use crate::ThreadSafeStore;

/// State shared between the controller's event loop and registration.
pub(crate) struct SharedState<K> {
    store: Arc<dyn Store<K>>,
    registry: Arc<Registry<K>>,
    /// Serializes delta application against registration and replay
    block_deltas: Mutex<()>,
    synced: Signal,
    resync_completed: mpsc::UnboundedSender<()>,
}

impl<K: Object> SharedState<K> {
    fn apply(
        &self,
        event: ReconcileEvent<K>,
    ) -> Result<()> {
        let _blocked = self.block_deltas.lock();
        match event {
            ReconcileEvent::Populated => {
                if self.synced.fire() {
                    debug!("shared informer synced");
                }
                self.registry.broadcast(Notification::Populated, Audience::All);
                Ok(())
            }
            ReconcileEvent::Resynced => {
                let participants = self.registry.take_syncing();
                if self.resync_completed.send(()).is_err() {
                    debug!("resync coordinator is gone");
                }
                send_all(&participants, Notification::Resynced);
                Ok(())
            }
            ReconcileEvent::NewDeltas(deltas) => {
                let key = deltas.key().to_string();
                let mut first_error = None;
                for delta in deltas {
                    let audience = if delta.delta_type == DeltaType::Resync {
                        Audience::Syncing
                    } else {
                        Audience::All
                    };
                    match apply_delta(self.store.as_ref(), &key, delta) {
                        Ok(notification) => self.registry.broadcast(notification, audience),
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

#[async_trait]
impl<K: Object> Reconciler<K> for SharedState<K> {
    async fn reconcile(
        &self,
        event: ReconcileEvent<K>,
    ) -> Result<()> {
        self.apply(event)
    }
}

/// Informer whose cache and watch are shared by many handlers.
pub struct SharedInformer<K: Object> {
    controller: Controller<K>,
    state: Arc<SharedState<K>>,
    coordinator: Mutex<Option<ResyncCoordinator<K>>>,
    resync_requests: mpsc::Sender<ListenerId>,
    /// Set once running; listeners added afterwards start immediately under it
    scope: Mutex<Option<CancellationToken>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl<K: Object> std::fmt::Debug for SharedInformer<K> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("SharedInformer")
            .field("controller", &self.controller)
            .field("listeners", &self.listener_count())
            .field("synced", &self.has_synced())
            .finish_non_exhaustive()
    }
}

impl<K: Object> SharedInformer<K> {
    /// Resync is driven by listener requests only; the controller's periodic
    /// resync setting does not apply.
    pub fn new(
        lister_watcher: Arc<dyn ListerWatcher<K>>,
        key_func: KeyFunc<K>,
        config: &InformerConfig,
    ) -> Self {
        let store: Arc<dyn Store<K>> = Arc::new(ThreadSafeStore::new(key_func.clone()));
        let registry = Arc::new(Registry::new());

        let (resync_requests, requests_rx) = mpsc::channel(config.listener.resync_request_buffer_size.max(1));
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::channel(1);

        let state = Arc::new(SharedState {
            store: store.clone(),
            registry: registry.clone(),
            block_deltas: Mutex::new(()),
            synced: Signal::new(),
            resync_completed: completed_tx,
        });
        let controller = Controller::new(lister_watcher, key_func, store, state.clone(), config)
            .with_resync(ResyncTrigger::Channel(tick_rx));
        let coordinator = ResyncCoordinator::new(registry, requests_rx, completed_rx, tick_tx);

        Self {
            controller,
            state,
            coordinator: Mutex::new(Some(coordinator)),
            resync_requests,
            scope: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `handler`.
    ///
    /// Before start the listener waits for the informer. Once started, the
    /// current cache is replayed to it as initial adds, followed by
    /// `Populated` when the informer has synced.
    pub fn add_event_handler(
        &self,
        handler: Arc<dyn ResourceEventHandler<K>>,
        options: HandlerOptions,
    ) -> ListenerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let listener = Listener::new(id, handler, inbound_rx, options, self.resync_requests.clone());
        let handle = listener.handle();

        let _blocked = self.state.block_deltas.lock();
        let scope = self.scope.lock().clone();
        match scope {
            None => {
                self.state.registry.register(id, inbound_tx, Some(listener));
                debug!(listener = id, "listener registered, waiting for start");
            }
            Some(scope) => {
                let replay = self.state.store.all();
                let replayed = replay.len();
                for obj in replay {
                    let _ = inbound_tx.send(Notification::Add {
                        obj,
                        is_initial_list: true,
                    });
                }
                if self.state.synced.is_fired() {
                    let _ = inbound_tx.send(Notification::Populated);
                }
                self.state.registry.register(id, inbound_tx, None);
                listener.start(&scope, &mut self.tasks.lock());
                debug!(listener = id, replayed, "listener joined running informer");
            }
        }
        REGISTERED_LISTENERS.inc();
        handle
    }

    /// Unregister the listener. It finishes delivering what it already holds.
    /// Unknown or already-removed handles are ignored.
    pub fn remove_event_handler(
        &self,
        handle: &ListenerHandle,
    ) {
        let _blocked = self.state.block_deltas.lock();
        if self.state.registry.remove(handle.id()) {
            REGISTERED_LISTENERS.dec();
            debug!(listener = handle.id(), "listener removed");
        }
    }

    /// Run until `cancel` fires or the watch fails, then stop every listener
    /// and join all tasks. May be called once.
    pub async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<()> {
        let Some(coordinator) = self.coordinator.lock().take() else {
            return Err(Error::AlreadyStarted {
                component: "SharedInformer",
            });
        };

        let scope = cancel.child_token();
        {
            let _blocked = self.state.block_deltas.lock();
            *self.scope.lock() = Some(scope.clone());
            let mut tasks = self.tasks.lock();
            for listener in self.state.registry.take_pending() {
                listener.start(&scope, &mut tasks);
            }
            let coordinator_scope = scope.clone();
            spawn_task(
                "resync-coordinator",
                move || coordinator.run(coordinator_scope),
                Some(&mut *tasks),
            );
        }
        debug!(listeners = self.listener_count(), "shared informer started");

        let result = self.controller.run(scope.clone()).await;

        scope.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        join_tasks(tasks).await;
        debug!("shared informer stopped");
        result
    }

    pub fn store(&self) -> Arc<dyn Store<K>> {
        self.state.store.clone()
    }

    /// True once the initial list has been applied and broadcast
    pub fn has_synced(&self) -> bool {
        self.state.synced.is_fired()
    }

    pub async fn wait_for_sync(&self) {
        self.state.synced.wait().await
    }

    pub fn listener_count(&self) -> usize {
        self.state.registry.len()
    }

    pub fn is_started(&self) -> bool {
        self.scope.lock().is_some()
    }
}
