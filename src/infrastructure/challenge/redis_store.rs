use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{ChallengeStore, ChallengeStorePtr};

/// Open a client for `url`. No connection is made until first use.
pub fn create_redis_challenge_store(url: &str) -> Result<ChallengeStorePtr> {
    // ---
    let client = Client::open(url).context("invalid Redis URL")?;
    Ok(Arc::new(RedisChallengeStore { client }))
}

/// Challenge state in Redis, shared by every instance of the service.
///
/// Expiry uses `SET .. EX`; consumption uses `GETDEL`, so two requests racing
/// for the same challenge cannot both receive it.
pub struct RedisChallengeStore {
    // ---
    client: Client,
}

impl RedisChallengeStore {
    // ---
    async fn conn(&self) -> Result<MultiplexedConnection> {
        // ---
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| {
                tracing::error!("Failed to connect to Redis: {:?}", err);
                anyhow::Error::from(err).context("Redis connection failed")
            })
    }
}

#[async_trait::async_trait]
impl ChallengeStore for RedisChallengeStore {
    // ---
    async fn put(&self, key: &str, state: Vec<u8>, ttl: Duration) -> Result<()> {
        // ---
        let mut conn = self.conn().await?;
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, state, ttl_secs)
            .await
            .context("failed to store challenge")?;
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>> {
        // ---
        let mut conn = self.conn().await?;
        let state: Option<Vec<u8>> = conn
            .get_del(key)
            .await
            .context("failed to consume challenge")?;
        Ok(state)
    }

    async fn discard(&self, key: &str) -> Result<()> {
        // ---
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await.context("failed to discard challenge")?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        // ---
        let mut conn = self.conn().await?;
        let _: String = conn.ping().await.context("Redis ping failed")?;
        Ok(())
    }
}
