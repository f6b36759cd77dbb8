use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use informer::key_func;
use informer::meta_namespace_key_func;
use informer::KeyFunc;
use informer::ListerWatcher;
use informer::ObjectMeta;
use informer::ResourceEventHandler;
use informer::Result;
use informer::SourceError;
use informer::Watch;
use informer::WatchSender;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub const TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    pub revision: u32,
}

impl ObjectMeta for Pod {
    fn name(&self) -> &str {
        &self.name
    }

    fn namespace(&self) -> Option<&str> {
        Some(&self.namespace)
    }
}

pub fn pod(
    name: &str,
    revision: u32,
) -> Pod {
    Pod {
        namespace: "default".to_string(),
        name: name.to_string(),
        revision,
    }
}

pub fn pod_key_func() -> KeyFunc<Pod> {
    key_func(meta_namespace_key_func::<Pod>)
}

/// Serves one fixed list and a single channel-backed watch.
pub struct FakeSource {
    items: Vec<Pod>,
    watch: Mutex<Option<Watch<Pod>>>,
}

impl FakeSource {
    pub fn new(items: Vec<Pod>) -> (Arc<Self>, WatchSender<Pod>) {
        let (sender, watch) = Watch::channel(64);
        let source = Arc::new(Self {
            items,
            watch: Mutex::new(Some(watch)),
        });
        (source, sender)
    }
}

#[async_trait]
impl ListerWatcher<Pod> for FakeSource {
    async fn list(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Pod>> {
        Ok(self.items.clone())
    }

    async fn watch(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<Watch<Pod>> {
        self.watch
            .lock()
            .take()
            .ok_or_else(|| SourceError::Watch("only one watch is served".into()).into())
    }
}

/// Records callbacks as `add:name[:initial]`, `update:name@rev`, `delete:name`.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
    notify: Notify,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub async fn wait_for(
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
        if tokio::time::timeout(TIMEOUT, wait).await.is_err() {
            panic!("timed out waiting for {count} events, got {:?}", self.events());
        }
        self.events()
    }

    fn record(
        &self,
        event: String,
    ) {
        self.events.lock().push(event);
        self.notify.notify_waiters();
    }
}

impl ResourceEventHandler<Pod> for Recorder {
    fn on_add(
        &self,
        obj: &Pod,
        is_initial_list: bool,
    ) {
        let suffix = if is_initial_list { ":initial" } else { "" };
        self.record(format!("add:{}{suffix}", obj.name));
    }

    fn on_update(
        &self,
        _old: &Pod,
        new: &Pod,
    ) {
        self.record(format!("update:{}@{}", new.name, new.revision));
    }

    fn on_delete(
        &self,
        obj: &Pod,
    ) {
        self.record(format!("delete:{}", obj.name));
    }
}
