//! Per-consumer notification pipeline.
//!
//! ```text
//! inbound (unbounded) -> pump [VecDeque] -> handoff (capacity 1) -> invoker -> handler
//!                         |  ^
//!          resync request |  | own resync trigger
//! ```
//!
//! The pump never blocks on a single participant: every branch of its select
//! is switched on or off per iteration, so a slow handler only grows the
//! private buffer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use crate::controller::ResyncTicker;
use crate::metrics::NOTIFICATIONS_DISPATCHED;
use crate::utils::async_task::spawn_task;
use crate::Notification;
use crate::Object;
use crate::ResourceEventHandler;
use crate::Result;
use crate::ResyncTrigger;
use crate::Signal;

pub type ListenerId = u64;

/// Per-handler registration options.
#[derive(Debug, Default)]
pub struct HandlerOptions {
    resync: Option<ResyncTrigger>,
}

impl HandlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a resync round every `period`
    pub fn with_resync_period(
        self,
        period: Duration,
    ) -> Self {
        self.with_resync_trigger(ResyncTrigger::Interval(period))
    }

    pub fn with_resync_trigger(
        mut self,
        trigger: ResyncTrigger,
    ) -> Self {
        self.resync = Some(trigger);
        self
    }
}

/// Returned by registration; identifies the listener for removal.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    synced: Signal,
}

impl ListenerHandle {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// True once this listener's handler received its whole initial list
    pub fn has_synced(&self) -> bool {
        self.synced.is_fired()
    }

    pub async fn wait_synced(&self) {
        self.synced.wait().await
    }
}

pub(crate) struct Listener<K> {
    id: ListenerId,
    handler: Arc<dyn ResourceEventHandler<K>>,
    inbound: mpsc::UnboundedReceiver<Notification<K>>,
    resync: Option<ResyncTrigger>,
    resync_requests: mpsc::Sender<ListenerId>,
    synced: Signal,
}

impl<K: Object> Listener<K> {
    pub(crate) fn new(
        id: ListenerId,
        handler: Arc<dyn ResourceEventHandler<K>>,
        inbound: mpsc::UnboundedReceiver<Notification<K>>,
        options: HandlerOptions,
        resync_requests: mpsc::Sender<ListenerId>,
    ) -> Self {
        Self {
            id,
            handler,
            inbound,
            resync: options.resync,
            resync_requests,
            synced: Signal::new(),
        }
    }

    pub(crate) fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            id: self.id,
            synced: self.synced.clone(),
        }
    }

    /// Spawn the pump and invoker tasks.
    pub(crate) fn start(
        self,
        cancel: &CancellationToken,
        tasks: &mut Vec<JoinHandle<()>>,
    ) {
        let Listener {
            id,
            handler,
            inbound,
            resync,
            resync_requests,
            synced,
        } = self;
        debug!(listener = id, resync = resync.is_some(), "listener starting");

        let (handoff_tx, handoff_rx) = mpsc::channel(1);
        let pump = Pump {
            id,
            inbound,
            buffer: VecDeque::new(),
            handoff: handoff_tx,
            ticker: resync.map(ResyncTrigger::into_ticker),
            resync_requests,
        };

        let pump_cancel = cancel.clone();
        spawn_task(
            &format!("listener-{id}-pump"),
            move || pump.run(pump_cancel),
            Some(&mut *tasks),
        );

        let invoker_cancel = cancel.clone();
        spawn_task(
            &format!("listener-{id}-invoker"),
            move || invoke(id, handoff_rx, handler, synced, invoker_cancel),
            Some(&mut *tasks),
        );
    }
}

struct Pump<K> {
    id: ListenerId,
    inbound: mpsc::UnboundedReceiver<Notification<K>>,
    buffer: VecDeque<Notification<K>>,
    handoff: mpsc::Sender<Notification<K>>,
    ticker: Option<ResyncTicker>,
    resync_requests: mpsc::Sender<ListenerId>,
}

impl<K: Object> Pump<K> {
    async fn run(
        mut self,
        cancel: CancellationToken,
    ) -> Result<()> {
        let mut inbound_open = true;
        let mut resync_wanted = false;

        while inbound_open || !self.buffer.is_empty() {
            let has_ticker = self.ticker.is_some();
            let has_buffered = !self.buffer.is_empty();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = self.inbound.recv(), if inbound_open => match received {
                    Some(notification) => self.buffer.push_back(notification),
                    None => {
                        trace!(listener = self.id, buffered = self.buffer.len(), "inbound closed, draining");
                        inbound_open = false;
                    }
                },
                permit = self.handoff.reserve(), if has_buffered => match permit {
                    Ok(permit) => {
                        if let Some(notification) = self.buffer.pop_front() {
                            permit.send(notification);
                        }
                    }
                    // invoker is gone
                    Err(_) => break,
                },
                tick = next_tick(&mut self.ticker), if has_ticker && !resync_wanted => match tick {
                    Some(()) => resync_wanted = true,
                    None => self.ticker = None,
                },
                permit = self.resync_requests.reserve(), if resync_wanted => match permit {
                    Ok(permit) => {
                        trace!(listener = self.id, "resync requested");
                        permit.send(self.id);
                        resync_wanted = false;
                    }
                    Err(_) => {
                        resync_wanted = false;
                        self.ticker = None;
                    }
                },
            }
        }

        debug!(listener = self.id, "listener pump stopped");
        Ok(())
    }
}

async fn next_tick(ticker: &mut Option<ResyncTicker>) -> Option<()> {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}

/// Deliver handed-off notifications one at a time.
async fn invoke<K: Object>(
    id: ListenerId,
    mut handoff: mpsc::Receiver<Notification<K>>,
    handler: Arc<dyn ResourceEventHandler<K>>,
    synced: Signal,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let notification = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            notification = handoff.recv() => notification,
        };
        let Some(notification) = notification else {
            break;
        };

        if matches!(notification, Notification::Populated) && synced.fire() {
            debug!(listener = id, "listener synced");
        }
        notification.dispatch(handler.as_ref());
        NOTIFICATIONS_DISPATCHED.with_label_values(&[notification.kind()]).inc();
    }
    debug!(listener = id, "listener invoker stopped");
    Ok(())
}
