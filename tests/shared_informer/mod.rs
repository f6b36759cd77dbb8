use std::sync::Arc;
use std::time::Duration;

use informer::HandlerOptions;
use informer::InformerConfig;
use informer::SharedInformer;
use informer::Store;
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
async fn test_list_then_watch_end_to_end() {
    let (source, sender) = FakeSource::new(vec![pod("foo", 1), pod("bar", 1)]);
    let informer = Arc::new(SharedInformer::new(source, pod_key_func(), &InformerConfig::default()));
    let cancel = CancellationToken::new();
    let run = {
        let informer = informer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { informer.run(cancel).await })
    };

    tokio::time::timeout(TIMEOUT, informer.wait_for_sync()).await.unwrap();

    let recorder = Recorder::new();
    let handle = informer.add_event_handler(recorder.clone(), HandlerOptions::new());
    tokio::time::timeout(TIMEOUT, handle.wait_synced()).await.unwrap();

    let mut initial = recorder.events();
    initial.sort();
    assert_eq!(initial, vec!["add:bar:initial", "add:foo:initial"]);

    sender.send(WatchEvent::Created(pod("baz", 1))).await.unwrap();
    sender.send(WatchEvent::Deleted(pod("foo", 1))).await.unwrap();
    sender.send(WatchEvent::Updated(pod("bar", 2))).await.unwrap();

    let events = recorder.wait_for(5).await;
    assert_eq!(events[2..], ["add:baz", "delete:foo", "update:bar@2"]);

    let store = informer.store();
    assert_eq!(store.get("default/bar").unwrap().revision, 2);
    assert!(store.get("default/foo").unwrap_err().is_not_found());

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
#[traced_test]
async fn test_independent_listeners_and_periodic_resync() {
    let (source, sender) = FakeSource::new(vec![pod("foo", 1)]);
    let informer = Arc::new(SharedInformer::new(source, pod_key_func(), &InformerConfig::default()));

    let resyncing = Recorder::new();
    let plain = Recorder::new();
    informer.add_event_handler(
        resyncing.clone(),
        HandlerOptions::new().with_resync_period(Duration::from_millis(100)),
    );
    let plain_handle = informer.add_event_handler(plain.clone(), HandlerOptions::new());

    let cancel = CancellationToken::new();
    let run = {
        let informer = informer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { informer.run(cancel).await })
    };
    tokio::time::timeout(TIMEOUT, plain_handle.wait_synced()).await.unwrap();

    // periodic rounds redeliver the cache only to the listener that asked
    let events = resyncing.wait_for(3).await;
    assert_eq!(events[..3], ["add:foo:initial", "update:foo@1", "update:foo@1"]);

    sender.send(WatchEvent::Updated(pod("foo", 2))).await.unwrap();
    assert_eq!(plain.wait_for(2).await, vec!["add:foo:initial", "update:foo@2"]);

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(plain.events().len(), 2);
}

#[tokio::test]
#[traced_test]
async fn test_shutdown_with_many_listeners_terminates() {
    let items = (0..100).map(|i| pod(&format!("pod-{i}"), 1)).collect();
    let (source, _sender) = FakeSource::new(items);
    let informer = Arc::new(SharedInformer::new(source, pod_key_func(), &InformerConfig::default()));
    let recorders: Vec<_> = (0..8)
        .map(|_| {
            let recorder = Recorder::new();
            informer.add_event_handler(recorder.clone(), HandlerOptions::new());
            recorder
        })
        .collect();

    let cancel = CancellationToken::new();
    let run = {
        let informer = informer.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { informer.run(cancel).await })
    };
    tokio::time::timeout(TIMEOUT, informer.wait_for_sync()).await.unwrap();
    for recorder in &recorders {
        recorder.wait_for(100).await;
    }

    cancel.cancel();
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap().unwrap();
    assert_eq!(informer.listener_count(), 8);
}
