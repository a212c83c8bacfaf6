//! Ceremony challenge stores.

mod memory_store;
mod redis_store;

pub use memory_store::create_memory_challenge_store;
pub use redis_store::create_redis_challenge_store;
