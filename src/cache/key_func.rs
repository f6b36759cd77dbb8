use std::sync::Arc;

use crate::CacheError;
use crate::Result;

/// Maps an object to the key it is cached and queued under.
///
/// Must be deterministic for a given logical identity.
pub type KeyFunc<K> = Arc<dyn Fn(&K) -> Result<String> + Send + Sync>;

/// Wrap a closure as a [`KeyFunc`].
pub fn key_func<K, F>(f: F) -> KeyFunc<K>
where
    F: Fn(&K) -> Result<String> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identity metadata of a control-plane resource.
pub trait ObjectMeta {
    fn name(&self) -> &str;

    /// `None` (or empty) for cluster-scoped resources
    fn namespace(&self) -> Option<&str>;
}

/// Key objects as `namespace/name`, or `name` for cluster-scoped objects.
pub fn meta_namespace_key_func<K: ObjectMeta>(obj: &K) -> Result<String> {
    let name = obj.name();
    if name.is_empty() {
        return Err(CacheError::KeyFunc {
            reason: "object has no name".to_string(),
        }
        .into());
    }
    Ok(match obj.namespace() {
        Some(ns) if !ns.is_empty() => format!("{ns}/{name}"),
        _ => name.to_string(),
    })
}

/// Inverse of [`meta_namespace_key_func`]: `(namespace, name)`.
pub fn split_meta_namespace_key(key: &str) -> Result<(Option<&str>, &str)> {
    let parts: Vec<&str> = key.split('/').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((None, *name)),
        [ns, name] if !name.is_empty() => Ok((Some(*ns), *name)),
        _ => Err(CacheError::KeyFunc {
            reason: format!("unexpected key format: {key:?}"),
        }
        .into()),
    }
}
