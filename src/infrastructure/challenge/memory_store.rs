use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::{ChallengeStore, ChallengeStorePtr};

pub fn create_memory_challenge_store() -> ChallengeStorePtr {
    // ---
    Arc::new(MemoryChallengeStore::default())
}

/// Process-local challenge state for development and tests.
///
/// Only valid for a single instance: ceremonies do not survive a restart.
#[derive(Default)]
pub struct MemoryChallengeStore {
    // ---
    entries: DashMap<String, (Vec<u8>, Instant)>,
}

#[async_trait::async_trait]
impl ChallengeStore for MemoryChallengeStore {
    // ---
    async fn put(&self, key: &str, state: Vec<u8>, ttl: Duration) -> Result<()> {
        // ---
        let now = Instant::now();
        self.entries.retain(|_, (_, expires)| *expires > now);
        self.entries.insert(key.to_string(), (state, now + ttl));
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // ---
        Ok(self
            .entries
            .remove(key)
            .filter(|(_, (_, expires))| *expires > Instant::now())
            .map(|(_, (state, _))| state))
    }

    async fn discard(&self, key: &str) -> Result<()> {
        // ---
        self.entries.remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        // ---
        Ok(())
    }
}
