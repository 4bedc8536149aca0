//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use agora_core::model::Author;
use agora_database::{Agora, SessionIdentity};
use agora_storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One client signed in as `id`, talking to `store`.
pub fn client(store: &Arc<MemoryStore>, id: &str, name: &str) -> Agora {
    Agora::builder()
        .store(store.clone())
        .identity(Arc::new(SessionIdentity::signed_in(Author::new(id, name))))
        .vote_backoff(Duration::from_millis(1), Duration::from_millis(10))
        .reconnect(3, Duration::from_millis(1))
        .build()
        .expect("valid test config")
}
