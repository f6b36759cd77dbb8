use std::ops::ControlFlow;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::DeltaSink;
use super::ListerWatcher;
use super::WatchEvent;
use crate::CacheError;
use crate::Error;
use crate::Object;
use crate::Result;
use crate::SourceError;

/// Mirrors a remote List+Watch source into a [`DeltaSink`].
pub struct Reflector<K: Object> {
    lister_watcher: Arc<dyn ListerWatcher<K>>,
    sink: Arc<dyn DeltaSink<K>>,
}

impl<K: Object> std::fmt::Debug for Reflector<K> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Reflector").finish_non_exhaustive()
    }
}

impl<K: Object> Reflector<K> {
    pub fn new(
        lister_watcher: Arc<dyn ListerWatcher<K>>,
        sink: Arc<dyn DeltaSink<K>>,
    ) -> Self {
        Self { lister_watcher, sink }
    }

    /// List once, submit the result as one populate batch, then forward the
    /// watch until `cancel` fires.
    ///
    /// Returns `Ok` on cancellation and [`SourceError::WatchClosed`] when the
    /// watch ends on its own. Restarting is left to the caller.
    pub async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<()> {
        debug!("reflector listing");
        let objs = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            listed = self.lister_watcher.list(&cancel) => listed?,
        };
        debug!(count = objs.len(), "reflector list complete");

        let populated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            r = self.sink.populate(objs) => r,
        };
        if let ControlFlow::Break(result) = self.settle(populated, &cancel) {
            return result;
        }

        let mut watch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            watch = self.lister_watcher.watch(&cancel) => watch?,
        };
        debug!("reflector watching");

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("reflector received shutdown signal");
                    watch.stop();
                    return Ok(());
                }
                event = watch.next() => event,
            };

            let Some(event) = event else {
                if cancel.is_cancelled() {
                    return Ok(());
                }
                error!("watch stream closed unexpectedly");
                return Err(SourceError::WatchClosed.into());
            };
            trace!(?event, "watch event");

            let forwarded = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    watch.stop();
                    return Ok(());
                }
                r = self.forward(event) => r,
            };
            if let ControlFlow::Break(result) = self.settle(forwarded, &cancel) {
                watch.stop();
                return result;
            }
        }
    }

    async fn forward(
        &self,
        event: WatchEvent<K>,
    ) -> Result<()> {
        match event {
            WatchEvent::Created(obj) => self.sink.add(obj).await,
            WatchEvent::Updated(obj) => self.sink.update(obj).await,
            WatchEvent::Deleted(obj) => self.sink.delete(obj).await,
        }
    }

    /// Decide whether a sink outcome ends the run.
    fn settle(
        &self,
        result: Result<()>,
        cancel: &CancellationToken,
    ) -> ControlFlow<Result<()>> {
        match result {
            Ok(()) => ControlFlow::Continue(()),
            Err(Error::Cache(CacheError::KeyFunc { reason })) => {
                warn!("skipping watch event without a key: {}", reason);
                ControlFlow::Continue(())
            }
            Err(e) if e.is_closed() && cancel.is_cancelled() => ControlFlow::Break(Ok(())),
            Err(e) => {
                error!("reflector sink failed: {:?}", e);
                ControlFlow::Break(Err(e))
            }
        }
    }
}
