//! Delta FIFO
//!
//! A per-key, compacting change queue owned by a single background task.
//!
//! # Architecture
//!
//! ```text
//! Reflector / Controller (submitters):
//!   add / update / delete / populate / resync / pop -> input channel (bounded)
//!                                                         ↓
//! Queue task (sole owner of the pending map):
//!   input.recv() -> append + compact -> NewDeltas(key) on empty→non-empty
//!                                                         ↓
//! Consumer:
//!   events() -> NewDeltas(key) -> pop(key) -> Deltas
//! ```
//!
//! At most one `NewDeltas` is outstanding per key: further deltas for a key
//! are appended silently until the key is popped. The pending map is never
//! touched outside the queue task, so it carries no lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::Delta;
use super::DeltaFifoEvent;
use super::DeltaType;
use super::Deltas;
use super::Lifecycle;
use crate::metrics::DELTAS_QUEUED;
use crate::metrics::PENDING_KEYS;
use crate::Error;
use crate::KeyFunc;
use crate::Object;
use crate::QueueConfig;
use crate::QueueError;
use crate::Result;
use crate::Signal;

enum Input<K> {
    Delta {
        key: String,
        delta: Delta<K>,
    },
    Populate(Vec<(String, K)>),
    Resync(Vec<(String, K)>),
    Pop {
        key: String,
        reply: oneshot::Sender<Deltas<K>>,
    },
}

pub struct DeltaFifo<K: Object> {
    key_func: KeyFunc<K>,
    input_tx: mpsc::Sender<Input<K>>,
    input_rx: Mutex<Option<mpsc::Receiver<Input<K>>>>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<DeltaFifoEvent>>>,
    events_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<DeltaFifoEvent>>>,
    lifecycle: Mutex<Lifecycle>,
    /// Cancelled once the queue task has fully stopped
    closed: CancellationToken,
    synced: Signal,
}

impl<K: Object> std::fmt::Debug for DeltaFifo<K> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DeltaFifo")
            .field("lifecycle", &*self.lifecycle.lock())
            .field("synced", &self.synced.is_fired())
            .finish_non_exhaustive()
    }
}

impl<K: Object> DeltaFifo<K> {
    pub fn new(
        key_func: KeyFunc<K>,
        config: &QueueConfig,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::channel(config.input_buffer_size.max(1));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            key_func,
            input_tx,
            input_rx: Mutex::new(Some(input_rx)),
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: Arc::new(tokio::sync::Mutex::new(events_rx)),
            lifecycle: Mutex::new(Lifecycle::Initial),
            closed: CancellationToken::new(),
            synced: Signal::new(),
        }
    }

    pub async fn add(
        &self,
        obj: K,
    ) -> Result<()> {
        self.submit_delta(DeltaType::Added, obj).await
    }

    pub async fn update(
        &self,
        obj: K,
    ) -> Result<()> {
        self.submit_delta(DeltaType::Updated, obj).await
    }

    pub async fn delete(
        &self,
        obj: K,
    ) -> Result<()> {
        self.submit_delta(DeltaType::Deleted, obj).await
    }

    /// Queue the initial list. Objects whose key cannot be computed are skipped.
    pub async fn populate(
        &self,
        objs: Vec<K>,
    ) -> Result<()> {
        let items = self.keyed(objs);
        self.submit(Input::Populate(items)).await
    }

    /// Queue a resync batch. Keys with pending deltas are left untouched; one
    /// `Resynced` event always concludes the batch.
    pub async fn resync(
        &self,
        objs: Vec<K>,
    ) -> Result<()> {
        let items = self.keyed(objs);
        self.submit(Input::Resync(items)).await
    }

    /// Remove and return the pending deltas of `key`.
    ///
    /// Waits until the key has deltas. Fails with [`QueueError::Closed`] once
    /// the queue stops.
    pub async fn pop(
        &self,
        key: &str,
    ) -> Result<Deltas<K>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Input::Pop {
            key: key.to_string(),
            reply,
        })
        .await?;

        tokio::select! {
            biased;
            deltas = rx => deltas.map_err(|_| Error::from(QueueError::Closed)),
            _ = self.closed.cancelled() => Err(Error::from(QueueError::Closed)),
        }
    }

    /// Stream of queue events.
    ///
    /// Every call reads from the same underlying channel, so each event is
    /// observed by exactly one reader. The stream ends once the queue stops.
    pub fn events(&self) -> BoxStream<'static, DeltaFifoEvent> {
        let rx = self.events_rx.clone();
        futures::stream::unfold(rx, |rx| async move {
            let event = rx.lock().await.recv().await;
            event.map(|e| (e, rx))
        })
        .boxed()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// True once the initial input has been queued
    pub fn has_synced(&self) -> bool {
        self.synced.is_fired()
    }

    pub async fn wait_synced(&self) {
        self.synced.wait().await
    }

    /// Run the queue task until `cancel` fires, then shut down: stop intake,
    /// fail outstanding pops, close the event stream.
    ///
    /// May be called once per queue.
    pub async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<()> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle != Lifecycle::Initial {
                return Err(Error::AlreadyStarted {
                    component: "DeltaFifo",
                });
            }
            *lifecycle = Lifecycle::Running;
        }

        let (mut input_rx, events_tx) = match (self.input_rx.lock().take(), self.events_tx.lock().take()) {
            (Some(rx), Some(tx)) => (rx, tx),
            _ => return Err(Error::Fatal("delta fifo channels already taken".to_string())),
        };

        debug!("delta fifo started");
        let mut worker = Worker::new(events_tx, self.synced.clone());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("delta fifo received shutdown signal");
                    break;
                }
                input = input_rx.recv() => match input {
                    Some(input) => worker.handle(input),
                    None => break,
                }
            }
        }

        *self.lifecycle.lock() = Lifecycle::Stopping;
        input_rx.close();
        while let Some(input) = input_rx.recv().await {
            worker.discard(input);
        }
        worker.shutdown();

        *self.lifecycle.lock() = Lifecycle::Stopped;
        self.closed.cancel();
        debug!("delta fifo stopped");
        Ok(())
    }

    async fn submit_delta(
        &self,
        delta_type: DeltaType,
        obj: K,
    ) -> Result<()> {
        let key = (self.key_func)(&obj)?;
        self.submit(Input::Delta {
            key,
            delta: Delta::new(delta_type, obj),
        })
        .await
    }

    async fn submit(
        &self,
        input: Input<K>,
    ) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(QueueError::Closed.into());
        }
        tokio::select! {
            sent = self.input_tx.send(input) => sent.map_err(|_| Error::from(QueueError::Closed)),
            _ = self.closed.cancelled() => Err(Error::from(QueueError::Closed)),
        }
    }

    fn keyed(
        &self,
        objs: Vec<K>,
    ) -> Vec<(String, K)> {
        objs.into_iter()
            .filter_map(|obj| match (self.key_func)(&obj) {
                Ok(key) => Some((key, obj)),
                Err(e) => {
                    warn!("skipping object without a key: {:?}: {}", obj, e);
                    None
                }
            })
            .collect()
    }
}

/// State owned exclusively by the queue task.
struct Worker<K> {
    pending: HashMap<String, Deltas<K>>,
    /// Pops parked until their key receives deltas
    waiting: HashMap<String, VecDeque<oneshot::Sender<Deltas<K>>>>,
    events_tx: mpsc::UnboundedSender<DeltaFifoEvent>,
    populated: bool,
    synced: Signal,
}

impl<K: Object> Worker<K> {
    fn new(
        events_tx: mpsc::UnboundedSender<DeltaFifoEvent>,
        synced: Signal,
    ) -> Self {
        Self {
            pending: HashMap::new(),
            waiting: HashMap::new(),
            events_tx,
            populated: false,
            synced,
        }
    }

    fn handle(
        &mut self,
        input: Input<K>,
    ) {
        match input {
            Input::Delta { key, delta } => {
                self.append(key, delta);
                self.mark_populated();
            }
            Input::Populate(items) => {
                trace!(count = items.len(), "populate batch");
                for (key, obj) in items {
                    self.append(key, Delta::new(DeltaType::Populate, obj));
                }
                self.mark_populated();
            }
            Input::Resync(items) => {
                let mut resynced = 0usize;
                for (key, obj) in items {
                    if self.pending.contains_key(&key) {
                        trace!(%key, "resync skipped: key has pending deltas");
                        continue;
                    }
                    self.append(key, Delta::new(DeltaType::Resync, obj));
                    resynced += 1;
                }
                trace!(resynced, "resync batch");
                self.mark_populated();
                self.emit(DeltaFifoEvent::Resynced);
            }
            Input::Pop { key, reply } => self.pop(key, reply),
        }
    }

    fn append(
        &mut self,
        key: String,
        delta: Delta<K>,
    ) {
        DELTAS_QUEUED.with_label_values(&[delta.delta_type.as_str()]).inc();

        if let Some(deltas) = self.pending.get_mut(&key) {
            deltas.push(delta);
            return;
        }

        let mut deltas = Deltas::new(key.clone());
        deltas.push(delta);
        if let Some(deltas) = self.hand_to_waiter(&key, deltas) {
            self.pending.insert(key.clone(), deltas);
            PENDING_KEYS.inc();
            self.emit(DeltaFifoEvent::NewDeltas(key));
        }
    }

    fn pop(
        &mut self,
        key: String,
        reply: oneshot::Sender<Deltas<K>>,
    ) {
        match self.pending.entry(key) {
            Entry::Occupied(entry) => {
                let (key, deltas) = entry.remove_entry();
                PENDING_KEYS.dec();
                if let Err(deltas) = reply.send(deltas) {
                    // The popper went away; requeue so the work is not lost.
                    trace!(%key, "pop abandoned, requeueing");
                    self.pending.insert(key.clone(), deltas);
                    PENDING_KEYS.inc();
                    self.emit(DeltaFifoEvent::NewDeltas(key));
                }
            }
            Entry::Vacant(entry) => {
                trace!(key = %entry.key(), "pop parked until deltas arrive");
                self.waiting.entry(entry.into_key()).or_default().push_back(reply);
            }
        }
    }

    /// Deliver freshly created deltas to a parked pop. Returns them back when
    /// nobody is waiting.
    fn hand_to_waiter(
        &mut self,
        key: &str,
        deltas: Deltas<K>,
    ) -> Option<Deltas<K>> {
        let mut remaining = Some(deltas);
        if let Some(waiters) = self.waiting.get_mut(key) {
            while let Some(waiter) = waiters.pop_front() {
                let Some(deltas) = remaining.take() else {
                    break;
                };
                match waiter.send(deltas) {
                    Ok(()) => break,
                    Err(deltas) => remaining = Some(deltas),
                }
            }
            if waiters.is_empty() {
                self.waiting.remove(key);
            }
        }
        remaining
    }

    fn mark_populated(&mut self) {
        if self.populated {
            return;
        }
        self.populated = true;
        self.emit(DeltaFifoEvent::Populated);
        self.synced.fire();
        debug!("delta fifo populated");
    }

    fn emit(
        &self,
        event: DeltaFifoEvent,
    ) {
        trace!(?event, "emit");
        if self.events_tx.send(event).is_err() {
            trace!("event stream has no reader");
        }
    }

    /// Inputs left in the channel at shutdown: pops fail, everything else is dropped.
    fn discard(
        &mut self,
        input: Input<K>,
    ) {
        match input {
            Input::Pop { key, reply } => {
                trace!(%key, "failing pop on shutdown");
                drop(reply);
            }
            Input::Delta { key, .. } => trace!(%key, "dropping delta on shutdown"),
            Input::Populate(items) | Input::Resync(items) => {
                trace!(count = items.len(), "dropping batch on shutdown")
            }
        }
    }

    fn shutdown(self) {
        let parked: usize = self.waiting.values().map(VecDeque::len).sum();
        debug!(
            pending = self.pending.len(),
            parked, "delta fifo shutting down"
        );
        PENDING_KEYS.sub(self.pending.len() as i64);
        // dropping the worker fails parked pops and closes the event stream
    }
}
