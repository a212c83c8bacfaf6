use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Ephemeral storage for in-flight WebAuthn ceremony state.
///
/// Entries expire after their TTL and are consumed with [`take`](Self::take),
/// which must read and delete in one atomic step.
#[async_trait::async_trait]
pub trait ChallengeStore: Send + Sync {
    // ---
    /// Store ceremony state under `key`, replacing any previous value.
    async fn put(&self, key: &str, state: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Atomically fetch and delete the state under `key`.
    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Drop the state under `key` without reading it.
    async fn discard(&self, key: &str) -> Result<()>;

    /// Round-trip check used by the full health check.
    async fn ping(&self) -> Result<()>;
}

pub type ChallengeStorePtr = Arc<dyn ChallengeStore>;
