use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use super::Listener;
use super::ListenerId;
use crate::Notification;
use crate::Object;

/// Which listeners a broadcast reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Audience {
    All,
    /// Only listeners taking part in the current resync round
    Syncing,
}

struct Entry<K> {
    inbound: mpsc::UnboundedSender<Notification<K>>,
    syncing: bool,
    /// Registered before the informer started; its tasks start with the informer
    pending: Option<Listener<K>>,
}

/// Registered listeners and their resync flags.
///
/// The lock only covers map operations; sends happen on a snapshot.
pub(crate) struct Registry<K> {
    entries: Mutex<HashMap<ListenerId, Entry<K>>>,
}

impl<K: Object> Registry<K> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn register(
        &self,
        id: ListenerId,
        inbound: mpsc::UnboundedSender<Notification<K>>,
        pending: Option<Listener<K>>,
    ) {
        self.entries.lock().insert(
            id,
            Entry {
                inbound,
                syncing: false,
                pending,
            },
        );
    }

    /// Drop the listener's inbound sender, closing its buffer. `false` for
    /// unknown ids.
    pub(crate) fn remove(
        &self,
        id: ListenerId,
    ) -> bool {
        self.entries.lock().remove(&id).is_some()
    }

    /// Listeners registered before start, handed over exactly once
    pub(crate) fn take_pending(&self) -> Vec<Listener<K>> {
        self.entries
            .lock()
            .values_mut()
            .filter_map(|entry| entry.pending.take())
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Flag `ids` as syncing. Unknown ids are ignored; returns how many were flagged.
    pub(crate) fn mark_syncing(
        &self,
        ids: &[ListenerId],
    ) -> usize {
        let mut entries = self.entries.lock();
        let mut marked = 0;
        for id in ids {
            if let Some(entry) = entries.get_mut(id) {
                entry.syncing = true;
                marked += 1;
            }
        }
        marked
    }

    /// Inbound senders of the syncing listeners; their flags are reset.
    pub(crate) fn take_syncing(&self) -> Vec<(ListenerId, mpsc::UnboundedSender<Notification<K>>)> {
        self.entries
            .lock()
            .iter_mut()
            .filter(|(_, entry)| entry.syncing)
            .map(|(id, entry)| {
                entry.syncing = false;
                (*id, entry.inbound.clone())
            })
            .collect()
    }

    pub(crate) fn broadcast(
        &self,
        notification: Notification<K>,
        audience: Audience,
    ) {
        let targets: Vec<_> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| audience == Audience::All || entry.syncing)
            .map(|(id, entry)| (*id, entry.inbound.clone()))
            .collect();
        send_all(&targets, notification);
    }
}

/// Deliver `notification` to every target. Closed inbound buffers are skipped.
pub(crate) fn send_all<K: Object>(
    targets: &[(ListenerId, mpsc::UnboundedSender<Notification<K>>)],
    notification: Notification<K>,
) {
    for (id, inbound) in targets {
        if inbound.send(notification.clone()).is_err() {
            trace!(listener = id, "listener inbound closed, notification dropped");
        }
    }
}
