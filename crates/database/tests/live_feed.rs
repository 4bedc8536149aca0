//! Live views driven through the `Agora` facade.

mod common;

use agora_core::model::{Location, PollDraft};
use agora_core::{OptionId, UserId};
use agora_database::{CategoryFilter, FeedEvent, QueryDescriptor, RankQuery, Snapshot};
use agora_storage::{Collection, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::timeout;

fn sf() -> Location {
    Location::new(37.7749, -122.4194, "San Francisco")
}

fn ny() -> Location {
    Location::new(40.7128, -74.0060, "New York")
}

/// Waits for the first published snapshot satisfying `pred`.
async fn wait_for<F>(rx: &mut UnboundedReceiver<FeedEvent>, pred: F) -> Arc<Snapshot>
where
    F: Fn(&Snapshot) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("feed closed");
            if pred(event.snapshot()) {
                return event.snapshot().clone();
            }
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

#[tokio::test]
async fn test_poll_feed_follows_writes() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let ana = common::client(&store, "u1", "Ana");
    let bo = common::client(&store, "u2", "Bo");

    let (tx, mut rx) = unbounded_channel();
    let handle = ana
        .subscribe(QueryDescriptor::AllPolls, move |event| {
            let _ = tx.send(event.clone());
        })
        .unwrap();

    let first = bo.create_poll(PollDraft::poll("Tea?", ["yes", "no"])).await.unwrap();
    let second = bo.create_poll(PollDraft::poll("Coffee?", ["yes", "no"])).await.unwrap();
    let snapshot = wait_for(&mut rx, |s| s.len() == 2).await;
    let ids: Vec<_> = snapshot.polls().map(|p| p.id.clone()).collect();
    assert_eq!(ids, vec![second.clone(), first.clone()]);

    bo.cast_vote(&first, &OptionId::from("opt-1")).await.unwrap();
    let snapshot = wait_for(&mut rx, |s| s.polls().any(|p| p.votes == 1)).await;
    let voted = snapshot.get(first.as_str()).unwrap();
    assert_eq!(voted.version, 2);

    bo.delete_poll(&second).await.unwrap();
    let snapshot = wait_for(&mut rx, |s| s.len() == 1).await;
    assert!(snapshot.get(second.as_str()).is_none());

    assert!(ana.unsubscribe(&handle));
    assert!(!ana.unsubscribe(&handle));
    assert_eq!(store.listener_count(&Collection::Polls), 0);
}

#[tokio::test]
async fn test_nearby_ranks_live_polls() {
    let store = Arc::new(MemoryStore::new());
    let ana = common::client(&store, "u1", "Ana");

    let (tx, mut rx) = unbounded_channel();
    let _guard = ana
        .subscribe_guarded(QueryDescriptor::AllPolls, move |event| {
            let _ = tx.send(event.clone());
        })
        .unwrap();

    let local = ana
        .create_poll(PollDraft::poll("Best burrito?", ["a", "b"]).category("Food").location(sf()))
        .await
        .unwrap();
    ana.create_poll(PollDraft::poll("Best bagel?", ["a", "b"]).category("Food").location(ny()))
        .await
        .unwrap();
    wait_for(&mut rx, |s| s.len() == 2).await;

    let query = RankQuery::around(sf()).radius_km(10.0);
    let ranked = ana.nearby(&query).await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].poll().id, local);
    assert!(ranked[0].distance_km < 1.0);

    let wide = RankQuery::around(sf()).radius_km(5000.0);
    let ranked = ana.nearby(&wide).await.unwrap();
    assert_eq!(ranked.len(), 2);
    assert!(ranked[0].distance_km <= ranked[1].distance_km);

    let filtered = wide.clone().category(CategoryFilter::Only("Tech".into()));
    assert!(ana.nearby(&filtered).await.unwrap().is_empty());

    let stats = ana.feed_stats(&wide.text("BAGEL")).await.unwrap();
    assert_eq!(stats.active_polls, 1);
}

#[tokio::test]
async fn test_comment_thread_is_live() {
    let store = Arc::new(MemoryStore::new());
    let ana = common::client(&store, "u1", "Ana");
    let bo = common::client(&store, "u2", "Bo");
    let poll = ana.create_poll(PollDraft::poll("Q?", ["a", "b"])).await.unwrap();

    let (tx, mut rx) = unbounded_channel();
    let _guard = ana
        .subscribe_guarded(QueryDescriptor::comments(poll.clone()), move |event| {
            let _ = tx.send(event.clone());
        })
        .unwrap();

    bo.post_comment(&poll, "first!").await.unwrap();
    bo.post_comment(&poll, "second").await.unwrap();
    let snapshot = wait_for(&mut rx, |s| s.len() == 2).await;
    let texts: Vec<_> = snapshot.comments().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["second", "first!"]);

    ana.delete_poll(&poll).await.unwrap();
    wait_for(&mut rx, |s| s.is_empty()).await;
}

#[tokio::test]
async fn test_unread_badge_follows_notifications() {
    let store = Arc::new(MemoryStore::new());
    let ana = common::client(&store, "u1", "Ana");
    let bo = common::client(&store, "u2", "Bo");
    let poll = ana.create_poll(PollDraft::poll("Q?", ["a", "b"])).await.unwrap();

    let u1 = UserId::from("u1");
    let (tx, mut rx) = unbounded_channel();
    let _guard = ana
        .subscribe_guarded(QueryDescriptor::notifications(u1.clone()), move |event| {
            let _ = tx.send(event.clone());
        })
        .unwrap();

    bo.post_comment(&poll, "hi").await.unwrap();
    bo.post_comment(&poll, "hello again").await.unwrap();
    wait_for(&mut rx, |s| s.unread_count() == 2).await;
    assert_eq!(ana.unread_count(&u1).await.unwrap(), 2);

    ana.mark_all_read(&u1).await.unwrap();
    let snapshot = wait_for(&mut rx, |s| s.unread_count() == 0).await;
    assert_eq!(snapshot.len(), 2);
    assert_eq!(ana.unread_count(&u1).await.unwrap(), 0);
}

#[tokio::test]
async fn test_broken_stream_reconnects() {
    let store = Arc::new(MemoryStore::new());
    let ana = common::client(&store, "u1", "Ana");

    let (tx, mut rx) = unbounded_channel();
    let _guard = ana
        .subscribe_guarded(QueryDescriptor::AllPolls, move |event| {
            let _ = tx.send(event.clone());
        })
        .unwrap();
    ana.create_poll(PollDraft::poll("Q1?", ["a", "b"])).await.unwrap();
    wait_for(&mut rx, |s| s.len() == 1).await;

    store.break_streams(&Collection::Polls, "connection reset");
    let degraded = wait_for(&mut rx, Snapshot::is_degraded).await;
    assert_eq!(degraded.len(), 1);

    let healthy = wait_for(&mut rx, |s| !s.is_degraded()).await;
    assert!(healthy.revision() > degraded.revision());

    ana.create_poll(PollDraft::poll("Q2?", ["a", "b"])).await.unwrap();
    wait_for(&mut rx, |s| s.len() == 2).await;
}
