use tokio::sync::mpsc;

use super::*;
use crate::test_utils::RecordingHandler;
use crate::Notification;

type Inbound = mpsc::UnboundedReceiver<Notification<String>>;

fn registry_with(ids: &[ListenerId]) -> (Registry<String>, Vec<Inbound>) {
    let registry = Registry::new();
    let receivers = ids
        .iter()
        .map(|id| {
            let (tx, rx) = mpsc::unbounded_channel();
            registry.register(*id, tx, None);
            rx
        })
        .collect();
    (registry, receivers)
}

fn add(name: &str) -> Notification<String> {
    Notification::Add {
        obj: name.to_string(),
        is_initial_list: false,
    }
}

#[test]
fn broadcast_to_all_reaches_every_listener() {
    let (registry, mut receivers) = registry_with(&[1, 2]);

    registry.broadcast(add("foo"), Audience::All);

    for rx in &mut receivers {
        assert_eq!(rx.try_recv().unwrap(), add("foo"));
    }
}

#[test]
fn syncing_audience_follows_flags_until_taken() {
    let (registry, mut receivers) = registry_with(&[1, 2]);

    assert_eq!(registry.mark_syncing(&[2, 99]), 1);
    registry.broadcast(add("foo"), Audience::Syncing);
    assert!(receivers[0].try_recv().is_err());
    assert_eq!(receivers[1].try_recv().unwrap(), add("foo"));

    let participants = registry.take_syncing();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0].0, 2);

    // flags were reset
    assert!(registry.take_syncing().is_empty());
    registry.broadcast(add("bar"), Audience::Syncing);
    assert!(receivers[1].try_recv().is_err());
}

#[test]
fn remove_closes_inbound_and_ignores_unknown_ids() {
    let (registry, mut receivers) = registry_with(&[1]);

    assert!(registry.remove(1));
    assert!(!registry.remove(1));
    assert!(!registry.remove(42));
    assert_eq!(registry.len(), 0);
    assert!(matches!(
        receivers[0].try_recv(),
        Err(mpsc::error::TryRecvError::Disconnected)
    ));
}

#[test]
fn send_all_skips_closed_listeners() {
    let (tx1, rx1) = mpsc::unbounded_channel();
    let (tx2, mut rx2) = mpsc::unbounded_channel();
    drop(rx1);

    send_all(&[(1, tx1), (2, tx2)], Notification::<String>::Resynced);
    assert_eq!(rx2.try_recv().unwrap(), Notification::Resynced);
}

#[test]
fn pending_listeners_are_handed_over_once() {
    let registry = Registry::<String>::new();
    let (requests, _requests_rx) = mpsc::channel(1);
    let (tx, rx) = mpsc::unbounded_channel();
    let listener = Listener::new(7, RecordingHandler::new(), rx, HandlerOptions::new(), requests);
    registry.register(7, tx, Some(listener));

    assert_eq!(registry.take_pending().len(), 1);
    assert!(registry.take_pending().is_empty());
    assert_eq!(registry.len(), 1);
}
