use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::Object;
use crate::Result;
use crate::SourceError;

/// One change reported by a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent<K> {
    Created(K),
    Updated(K),
    Deleted(K),
}

/// An open watch: a stream of changes plus a way to stop it.
///
/// Dropping the watch stops it.
pub struct Watch<K> {
    events: BoxStream<'static, WatchEvent<K>>,
    stop: CancellationToken,
}

impl<K: Object> Watch<K> {
    /// `stop` is cancelled when the consumer stops the watch; producers
    /// observe it to release their resources.
    pub fn new(
        events: BoxStream<'static, WatchEvent<K>>,
        stop: CancellationToken,
    ) -> Self {
        Self { events, stop }
    }

    /// Channel-backed watch. The stream ends once every sender is dropped.
    pub fn channel(buffer: usize) -> (WatchSender<K>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let stop = CancellationToken::new();
        let sender = WatchSender {
            tx,
            stop: stop.clone(),
        };
        (sender, Self::new(ReceiverStream::new(rx).boxed(), stop))
    }

    /// Next change, `None` once the stream ended or the watch was stopped.
    pub async fn next(&mut self) -> Option<WatchEvent<K>> {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => None,
            event = self.events.next() => event,
        }
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl<K> Drop for Watch<K> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

impl<K> std::fmt::Debug for Watch<K> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Watch").field("stopped", &self.stop.is_cancelled()).finish()
    }
}

/// Producer side of [`Watch::channel`].
#[derive(Clone, Debug)]
pub struct WatchSender<K> {
    tx: mpsc::Sender<WatchEvent<K>>,
    stop: CancellationToken,
}

impl<K: Object> WatchSender<K> {
    /// Fails with [`SourceError::WatchClosed`] once the watch is stopped or dropped.
    pub async fn send(
        &self,
        event: WatchEvent<K>,
    ) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => Err(Error::from(SourceError::WatchClosed)),
            sent = self.tx.send(event) => sent.map_err(|_| Error::from(SourceError::WatchClosed)),
        }
    }

    /// Resolves once the consumer stopped the watch.
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}
