use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use super::Watch;
use crate::DeltaFifo;
use crate::Object;
use crate::Result;

/// Remote authoritative source of objects.
///
/// Implementations report failures as [`crate::SourceError::List`] and
/// [`crate::SourceError::Watch`].
#[async_trait]
pub trait ListerWatcher<K: Object>: Send + Sync + 'static {
    /// Full snapshot of the current objects
    async fn list(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<K>>;

    /// Changes since the snapshot
    async fn watch(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Watch<K>>;
}

/// Destination of the changes a reflector observes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeltaSink<K: Object>: Send + Sync + 'static {
    async fn populate(
        &self,
        objs: Vec<K>,
    ) -> Result<()>;

    async fn add(
        &self,
        obj: K,
    ) -> Result<()>;

    async fn update(
        &self,
        obj: K,
    ) -> Result<()>;

    async fn delete(
        &self,
        obj: K,
    ) -> Result<()>;
}

#[async_trait]
impl<K: Object> DeltaSink<K> for DeltaFifo<K> {
    async fn populate(
        &self,
        objs: Vec<K>,
    ) -> Result<()> {
        DeltaFifo::populate(self, objs).await
    }

    async fn add(
        &self,
        obj: K,
    ) -> Result<()> {
        DeltaFifo::add(self, obj).await
    }

    async fn update(
        &self,
        obj: K,
    ) -> Result<()> {
        DeltaFifo::update(self, obj).await
    }

    async fn delete(
        &self,
        obj: K,
    ) -> Result<()> {
        DeltaFifo::delete(self, obj).await
    }
}
