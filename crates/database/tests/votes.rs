//! Concurrent vote tests.

mod common;

use agora_core::model::{Author, PollDraft};
use agora_core::{Error, OptionId};
use agora_database::{Agora, SessionIdentity};
use agora_storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

fn patient_client(store: &Arc<MemoryStore>) -> Agora {
    Agora::builder()
        .store(store.clone())
        .identity(Arc::new(SessionIdentity::signed_in(Author::new("u1", "Ana"))))
        .vote_max_attempts(1000)
        .vote_backoff(Duration::from_micros(100), Duration::from_millis(5))
        .build()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_are_all_counted() {
    common::init_tracing();
    let store = Arc::new(MemoryStore::new());
    let agora = patient_client(&store);
    let poll = agora
        .create_poll(PollDraft::poll("Best coffee?", ["Blue Bottle", "Ritual", "Sightglass"]))
        .await
        .unwrap();

    let voters: Vec<_> = (0..50)
        .map(|_| {
            let agora = agora.clone();
            let poll = poll.clone();
            tokio::spawn(async move { agora.cast_vote(&poll, &OptionId::from("opt-1")).await })
        })
        .collect();
    for voter in voters {
        voter.await.unwrap().unwrap();
    }

    let stored = agora.get_poll(&poll).await.unwrap();
    assert_eq!(stored.option(&OptionId::from("opt-1")).unwrap().count, 50);
    assert_eq!(stored.votes, 50);
    assert!(stored.is_consistent());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_concurrent_votes_for_same_option() {
    let store = Arc::new(MemoryStore::new());
    let agora = patient_client(&store);
    let poll = agora.create_poll(PollDraft::poll("A or B?", ["A", "B"])).await.unwrap();

    let a = OptionId::from("opt-0");
    let (first, second) = tokio::join!(agora.cast_vote(&poll, &a), agora.cast_vote(&poll, &a));
    first.unwrap();
    second.unwrap();

    let stored = agora.get_poll(&poll).await.unwrap();
    assert_eq!(stored.option(&OptionId::from("opt-0")).unwrap().count, 2);
    assert_eq!(stored.option(&OptionId::from("opt-1")).unwrap().count, 0);
    assert_eq!(stored.votes, 2);
}

#[tokio::test]
async fn test_votes_on_different_options() {
    let store = Arc::new(MemoryStore::new());
    let agora = patient_client(&store);
    let poll = agora.create_poll(PollDraft::poll("Q?", ["a", "b", "c"])).await.unwrap();

    let votes = ["opt-0", "opt-2", "opt-2", "opt-1", "opt-2"];
    let results = spawn_votes(&agora, &poll, &votes).await;
    assert!(results.iter().all(Result::is_ok));

    let stored = agora.get_poll(&poll).await.unwrap();
    let counts: Vec<u64> = stored.options.iter().map(|o| o.count).collect();
    assert_eq!(counts, vec![1, 1, 3]);
    assert_eq!(stored.votes, 5);
}

async fn spawn_votes(
    agora: &Agora,
    poll: &agora_core::PollId,
    options: &[&str],
) -> Vec<Result<agora_core::model::Poll, Error>> {
    let mut handles = Vec::new();
    for option in options {
        let agora = agora.clone();
        let poll = poll.clone();
        let option = OptionId::from(*option);
        handles.push(tokio::spawn(async move { agora.cast_vote(&poll, &option).await }));
    }
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test]
async fn test_exhausted_retries_leave_poll_untouched() {
    let store = Arc::new(MemoryStore::new());
    let agora = common::client(&store, "u1", "Ana");
    let poll = agora.create_poll(PollDraft::poll("Q?", ["a", "b"])).await.unwrap();

    store.force_conflicts(agora.config().vote_max_attempts);
    let err = agora.cast_vote(&poll, &OptionId::from("opt-0")).await.unwrap_err();
    assert!(matches!(err, Error::ConflictExhausted { attempts: 5, .. }));

    assert_eq!(agora.get_poll(&poll).await.unwrap().votes, 0);

    // a manual retry goes through
    let voted = agora.cast_vote(&poll, &OptionId::from("opt-0")).await.unwrap();
    assert_eq!(voted.votes, 1);
}

#[tokio::test]
async fn test_vote_on_deleted_poll() {
    let store = Arc::new(MemoryStore::new());
    let agora = common::client(&store, "u1", "Ana");
    let poll = agora.create_poll(PollDraft::poll("Q?", ["a", "b"])).await.unwrap();
    agora.delete_poll(&poll).await.unwrap();

    let err = agora.cast_vote(&poll, &OptionId::from("opt-0")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}
