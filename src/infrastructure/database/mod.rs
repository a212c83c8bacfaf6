//! Credential Store backends and PostgreSQL bootstrap.

mod memory_repository;
mod postgres_repository;
mod schema;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseConfig;

pub use memory_repository::create_memory_repository;
pub use postgres_repository::create_postgres_repository;

/// Delay between connection attempts while the database comes up.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connect to PostgreSQL, retrying while it starts, then apply the schema.
///
/// # Errors
/// Fails once `config.retry_count` attempts are exhausted or if the schema
/// cannot be applied.
pub async fn init_database_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let mut attempt = 0;

    let pool = loop {
        attempt += 1;

        let result = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => break pool,
            Err(e) if attempt < config.retry_count => {
                tracing::warn!(
                    "Database not ready (attempt {}/{}): {}",
                    attempt,
                    config.retry_count,
                    e
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(e).context(format!(
                    "could not connect to database after {attempt} attempts"
                ));
            }
        }
    };

    sqlx::raw_sql(schema::SCHEMA)
        .execute(&pool)
        .await
        .context("failed to apply database schema")?;

    tracing::info!("Database ready after {} attempt(s)", attempt);
    Ok(pool)
}
