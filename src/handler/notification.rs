use tracing::trace;

use super::ResourceEventHandler;
use crate::Delta;
use crate::DeltaType;
use crate::Object;
use crate::Result;
use crate::Store;

/// A change as seen by one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification<K> {
    /// The initial list has been delivered
    Populated,
    /// A resync round this listener took part in has been delivered
    Resynced,
    Add { obj: K, is_initial_list: bool },
    Update { old: K, new: K },
    Delete { old: K },
}

impl<K: Object> Notification<K> {
    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Populated => "populated",
            Notification::Resynced => "resynced",
            Notification::Add { .. } => "add",
            Notification::Update { .. } => "update",
            Notification::Delete { .. } => "delete",
        }
    }

    /// Invoke the matching callback. Markers have no callback.
    pub fn dispatch(
        &self,
        handler: &dyn ResourceEventHandler<K>,
    ) {
        match self {
            Notification::Add { obj, is_initial_list } => handler.on_add(obj, *is_initial_list),
            Notification::Update { old, new } => handler.on_update(old, new),
            Notification::Delete { old } => handler.on_delete(old),
            Notification::Populated | Notification::Resynced => {}
        }
    }
}

/// Apply one delta of `key` to `store` and describe the change.
///
/// Added, Updated, Populate and Resync deltas become an update when the key is
/// already cached and an add otherwise. Deletion of an uncached key is not an
/// error.
pub fn apply_delta<K: Object>(
    store: &dyn Store<K>,
    key: &str,
    delta: Delta<K>,
) -> Result<Notification<K>> {
    trace!(%key, delta_type = %delta.delta_type, "apply delta");

    if delta.delta_type == DeltaType::Deleted {
        store.delete(key)?;
        return Ok(Notification::Delete { old: delta.object });
    }

    let is_initial_list = delta.delta_type == DeltaType::Populate;
    match store.get(key) {
        Ok(old) => {
            store.set(delta.object.clone())?;
            Ok(Notification::Update {
                old,
                new: delta.object,
            })
        }
        Err(e) if e.is_not_found() => {
            store.set(delta.object.clone())?;
            Ok(Notification::Add {
                obj: delta.object,
                is_initial_list,
            })
        }
        Err(e) => Err(e),
    }
}
