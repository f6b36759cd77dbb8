//! Key→object cache
//!
//! The [`Store`] is the one resource genuinely shared across caller threads:
//! the informer writes it while consumers read it concurrently. Implementations
//! provide their own internal synchronization.

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use tracing::trace;

use super::KeyFunc;
use super::Object;
use crate::CacheError;
use crate::Result;

#[cfg_attr(test, automock)]
pub trait Store<K: Object>: Send + Sync + 'static {
    /// Insert or replace the object under its key
    fn set(
        &self,
        obj: K,
    ) -> Result<()>;

    /// Remove the object cached under `key`. Removing a missing key succeeds.
    fn delete(
        &self,
        key: &str,
    ) -> Result<()>;

    /// Fails with [`CacheError::NotFound`] when nothing is cached under `key`
    fn get(
        &self,
        key: &str,
    ) -> Result<K>;

    /// Snapshot of every cached object. Each call is a fresh traversal.
    fn all(&self) -> Vec<K>;

    fn keys(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default [`Store`] on a sharded concurrent map.
///
/// `all()` only holds one shard's read lock at a time, so writers on other
/// shards proceed during a traversal.
pub struct ThreadSafeStore<K> {
    items: DashMap<String, K>,
    key_func: KeyFunc<K>,
}

impl<K: Object> ThreadSafeStore<K> {
    pub fn new(key_func: KeyFunc<K>) -> Self {
        Self {
            items: DashMap::new(),
            key_func,
        }
    }
}

impl<K> std::fmt::Debug for ThreadSafeStore<K> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ThreadSafeStore").field("len", &self.items.len()).finish()
    }
}

impl<K: Object> Store<K> for ThreadSafeStore<K> {
    fn set(
        &self,
        obj: K,
    ) -> Result<()> {
        let key = (self.key_func)(&obj)?;
        trace!(%key, "store set");
        self.items.insert(key, obj);
        Ok(())
    }

    fn delete(
        &self,
        key: &str,
    ) -> Result<()> {
        trace!(%key, "store delete");
        self.items.remove(key);
        Ok(())
    }

    fn get(
        &self,
        key: &str,
    ) -> Result<K> {
        self.items.get(key).map(|entry| entry.value().clone()).ok_or_else(|| {
            CacheError::NotFound {
                key: key.to_string(),
            }
            .into()
        })
    }

    fn all(&self) -> Vec<K> {
        self.items.iter().map(|entry| entry.value().clone()).collect()
    }

    fn keys(&self) -> Vec<String> {
        self.items.iter().map(|entry| entry.key().clone()).collect()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
