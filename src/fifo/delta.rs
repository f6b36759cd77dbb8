use std::fmt;

/// Kind of change a [`Delta`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaType {
    Added,
    Updated,
    Deleted,
    /// Object delivered by the initial list
    Populate,
    /// Object re-delivered from the cache by a resync
    Resync,
}

impl DeltaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaType::Added => "Added",
            DeltaType::Updated => "Updated",
            DeltaType::Deleted => "Deleted",
            DeltaType::Populate => "Populate",
            DeltaType::Resync => "Resync",
        }
    }
}

impl fmt::Display for DeltaType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded change for an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<K> {
    pub delta_type: DeltaType,
    pub object: K,
}

impl<K> Delta<K> {
    pub fn new(
        delta_type: DeltaType,
        object: K,
    ) -> Self {
        Self { delta_type, object }
    }
}

/// Ordered, compacted changes pending for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deltas<K> {
    key: String,
    items: Vec<Delta<K>>,
}

impl<K> Deltas<K> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            items: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append a delta, collapsing consecutive deletions into the newest one.
    pub fn push(
        &mut self,
        delta: Delta<K>,
    ) {
        if let Some(last) = self.items.last_mut() {
            if last.delta_type == DeltaType::Deleted && delta.delta_type == DeltaType::Deleted {
                *last = delta;
                return;
            }
        }
        self.items.push(delta);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recent delta
    pub fn newest(&self) -> Option<&Delta<K>> {
        self.items.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Delta<K>> {
        self.items.iter()
    }
}

impl<K> IntoIterator for Deltas<K> {
    type Item = Delta<K>;
    type IntoIter = std::vec::IntoIter<Delta<K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Work notification produced by the delta fifo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaFifoEvent {
    /// The first input reached the queue; emitted once per queue lifetime
    Populated,
    /// A resync batch was fully queued
    Resynced,
    /// The key's pending list became non-empty
    NewDeltas(String),
}

/// Delta fifo lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Lifecycle {
    Initial,
    Running,
    Stopping,
    Stopped,
}
