//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::key_func;
use crate::KeyFunc;
use crate::ListerWatcher;
use crate::ResourceEventHandler;
use crate::Result;
use crate::SourceError;
use crate::Watch;
use crate::WatchSender;

pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(2);
pub(crate) const QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Objects are `(name, revision)`; keyed by name.
pub(crate) type Versioned = (String, u32);

pub(crate) fn string_key_func() -> KeyFunc<String> {
    key_func(|s: &String| Ok(s.clone()))
}

pub(crate) fn versioned_key_func() -> KeyFunc<Versioned> {
    key_func(|obj: &Versioned| Ok(obj.0.clone()))
}

pub(crate) fn v(
    name: &str,
    revision: u32,
) -> Versioned {
    (name.to_string(), revision)
}

/// Next item of `stream`, failing the test after [`EVENT_TIMEOUT`].
pub(crate) async fn next_within<T>(stream: &mut BoxStream<'static, T>) -> Option<T> {
    tokio::time::timeout(EVENT_TIMEOUT, stream.next())
        .await
        .expect("timed out waiting for stream item")
}

/// Assert `stream` yields nothing for [`QUIET_PERIOD`].
pub(crate) async fn assert_quiet<T: std::fmt::Debug>(stream: &mut BoxStream<'static, T>) {
    if let Ok(item) = tokio::time::timeout(QUIET_PERIOD, stream.next()).await {
        panic!("unexpected stream item: {:?}", item);
    }
}

/// List+Watch source serving a fixed list and one channel-backed watch.
pub(crate) struct FakeListerWatcher<K> {
    items: Vec<K>,
    watch: Mutex<Option<Watch<K>>>,
}

impl<K: crate::Object> FakeListerWatcher<K> {
    pub(crate) fn new(items: Vec<K>) -> (Arc<Self>, WatchSender<K>) {
        let (sender, watch) = Watch::channel(16);
        let lw = Arc::new(Self {
            items,
            watch: Mutex::new(Some(watch)),
        });
        (lw, sender)
    }
}

#[async_trait]
impl<K: crate::Object> ListerWatcher<K> for FakeListerWatcher<K> {
    async fn list(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<K>> {
        Ok(self.items.clone())
    }

    async fn watch(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Watch<K>> {
        self.watch
            .lock()
            .take()
            .ok_or_else(|| SourceError::Watch("watch already consumed".into()).into())
    }
}

/// Handler recording every callback as a compact string.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    events: Mutex<Vec<String>>,
    notify: Notify,
}

impl RecordingHandler {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(
        &self,
        event: String,
    ) {
        self.events.lock().push(event);
        self.notify.notify_waiters();
    }

    /// Wait until at least `count` callbacks were recorded.
    pub(crate) async fn wait_for(
        &self,
        count: usize,
    ) -> Vec<String> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.events.lock().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(EVENT_TIMEOUT, wait)
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {count} events, got {:?}", self.events()));
        self.events()
    }
}

/// Compact rendering of test objects in recorded events.
pub(crate) trait Render {
    fn render(&self) -> String;
}

impl Render for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl Render for Versioned {
    fn render(&self) -> String {
        format!("{}@{}", self.0, self.1)
    }
}

impl<K: crate::Object + Render> ResourceEventHandler<K> for RecordingHandler {
    fn on_add(
        &self,
        obj: &K,
        is_initial_list: bool,
    ) {
        let suffix = if is_initial_list { ":initial" } else { "" };
        self.record(format!("add:{}{suffix}", obj.render()));
    }

    fn on_update(
        &self,
        _old: &K,
        new: &K,
    ) {
        self.record(format!("update:{}", new.render()));
    }

    fn on_delete(
        &self,
        obj: &K,
    ) {
        self.record(format!("delete:{}", obj.render()));
    }
}
