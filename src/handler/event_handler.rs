#[cfg(test)]
use mockall::automock;

use crate::Object;

/// Consumer callbacks for cache changes.
///
/// Callbacks of one listener are never invoked concurrently and arrive in
/// the order the changes were applied.
#[cfg_attr(test, automock)]
pub trait ResourceEventHandler<K: Object>: Send + Sync + 'static {
    /// `is_initial_list` is set for objects delivered by the initial list or a
    /// late-join replay of the cache
    fn on_add(
        &self,
        obj: &K,
        is_initial_list: bool,
    );

    fn on_update(
        &self,
        old: &K,
        new: &K,
    );

    fn on_delete(
        &self,
        obj: &K,
    );
}

type AddFn<K> = Box<dyn Fn(&K, bool) + Send + Sync>;
type UpdateFn<K> = Box<dyn Fn(&K, &K) + Send + Sync>;
type DeleteFn<K> = Box<dyn Fn(&K) + Send + Sync>;

/// [`ResourceEventHandler`] built from optional closures. Missing callbacks
/// ignore the change.
///
/// ```ignore
/// let handler = ResourceEventHandlerFuncs::new()
///     .with_add(|pod: &Pod, _| println!("added {}", pod.name()))
///     .with_delete(|pod: &Pod| println!("deleted {}", pod.name()));
/// ```
pub struct ResourceEventHandlerFuncs<K> {
    add: Option<AddFn<K>>,
    update: Option<UpdateFn<K>>,
    delete: Option<DeleteFn<K>>,
}

impl<K> Default for ResourceEventHandlerFuncs<K> {
    fn default() -> Self {
        Self {
            add: None,
            update: None,
            delete: None,
        }
    }
}

impl<K> std::fmt::Debug for ResourceEventHandlerFuncs<K> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ResourceEventHandlerFuncs")
            .field("add", &self.add.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

impl<K> ResourceEventHandlerFuncs<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_add(
        mut self,
        f: impl Fn(&K, bool) + Send + Sync + 'static,
    ) -> Self {
        self.add = Some(Box::new(f));
        self
    }

    pub fn with_update(
        mut self,
        f: impl Fn(&K, &K) + Send + Sync + 'static,
    ) -> Self {
        self.update = Some(Box::new(f));
        self
    }

    pub fn with_delete(
        mut self,
        f: impl Fn(&K) + Send + Sync + 'static,
    ) -> Self {
        self.delete = Some(Box::new(f));
        self
    }
}

impl<K: Object> ResourceEventHandler<K> for ResourceEventHandlerFuncs<K> {
    fn on_add(
        &self,
        obj: &K,
        is_initial_list: bool,
    ) {
        if let Some(f) = &self.add {
            f(obj, is_initial_list);
        }
    }

    fn on_update(
        &self,
        old: &K,
        new: &K,
    ) {
        if let Some(f) = &self.update {
            f(old, new);
        }
    }

    fn on_delete(
        &self,
        obj: &K,
    ) {
        if let Some(f) = &self.delete {
            f(obj);
        }
    }
}
