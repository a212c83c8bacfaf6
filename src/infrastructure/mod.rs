mod challenge;
mod database;
mod github;
pub mod metrics;
mod webauthn;

// Re-export the factory functions for easy access
pub use challenge::{create_memory_challenge_store, create_redis_challenge_store};
pub use database::{create_memory_repository, create_postgres_repository, init_database_with_retry};
pub use github::create_github_client;
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use webauthn::{create_webauthn, create_webauthn_verifier};
