use std::sync::Arc;

use informer::new_informer;
use informer::ControllerConfig;
use informer::InformerConfig;
use informer::WatchEvent;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use crate::common::pod;
use crate::common::pod_key_func;
use crate::common::FakeSource;
use crate::common::Recorder;
use crate::common::TIMEOUT;

#[tokio::test]
#[traced_test]
async fn test_default_informer_delivers_in_order() {
    let (source, sender) = FakeSource::new(vec![pod("foo", 1), pod("bar", 1)]);
    let recorder = Recorder::new();
    let (controller, synced) = new_informer(source, pod_key_func(), recorder.clone(), &InformerConfig::default());
    let controller = Arc::new(controller);

    let cancel = CancellationToken::new();
    let run = {
        let controller = controller.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { controller.run(cancel).await })
    };
    tokio::time::timeout(TIMEOUT, synced.wait()).await.unwrap();
    assert_eq!(recorder.events(), vec!["add:foo:initial", "add:bar:initial"]);

    sender.send(WatchEvent::Updated(pod("foo", 2))).await.unwrap();
    sender.send(WatchEvent::Updated(pod("foo", 3))).await.unwrap();
    sender.send(WatchEvent::Deleted(pod("foo", 3))).await.unwrap();
    sender.send(WatchEvent::Created(pod("foo", 4))).await.unwrap();

    let events = recorder.wait_for(6).await;
    assert_eq!(events[2..], ["update:foo@2", "update:foo@3", "delete:foo", "add:foo"]);
    assert_eq!(controller.store().len(), 2);

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_configured_resync_preserves_newer_changes() {
    let (source, sender) = FakeSource::new(vec![pod("foo", 1)]);
    let recorder = Recorder::new();
    let config = InformerConfig {
        controller: ControllerConfig {
            resync_period_ms: 100,
        },
        ..Default::default()
    }
    .validate()
    .unwrap();
    let (controller, synced) = new_informer(source, pod_key_func(), recorder.clone(), &config);

    let cancel = CancellationToken::new();
    let run = {
        let cancel = cancel.clone();
        tokio::spawn(async move { controller.run(cancel).await })
    };
    tokio::time::timeout(TIMEOUT, synced.wait()).await.unwrap();
    sender.send(WatchEvent::Updated(pod("foo", 2))).await.unwrap();

    // resync rounds never bring revision 1 back
    let events = recorder.wait_for(4).await;
    assert_eq!(events[1], "update:foo@2");
    assert!(events[2..].iter().all(|e| e == "update:foo@2"), "{events:?}");

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
}
