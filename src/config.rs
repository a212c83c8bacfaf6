// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

/// Reads an optional string variable with a default.
macro_rules! optional_env {
    // ---
    ($key:literal, $default:expr) => {
        std::env::var($key).unwrap_or_else(|_| $default.to_string())
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
/// All required configuration is validated eagerly during initialization.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: database::DatabaseConfig,
    pub redis: redis::RedisConfig,
    pub webauthn: webauthn::WebAuthnConfig,
    pub token: token::TokenConfig,
    pub github: github::GitHubConfig,
    pub http: http::HttpConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        Ok(Self {
            database: database::DatabaseConfig::from_env()?,
            redis: redis::RedisConfig::from_env()?,
            webauthn: webauthn::WebAuthnConfig::from_env()?,
            token: token::TokenConfig::from_env()?,
            github: github::GitHubConfig::from_env()?,
            http: http::HttpConfig::from_env(),
        })
    }
}

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Which Credential Store backend to run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum StoreType {
        Postgres,
        Memory,
    }

    /// Database-related configuration derived from environment variables.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// Backend selection. Defaults to PostgreSQL.
        pub store_type: StoreType,

        /// PostgreSQL connection string. Required for the PostgreSQL store.
        pub database_url: String,

        /// Number of retry attempts when initializing the database connection. Defaults to 50.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections open concurrently. Defaults to 15
        pub max_connections: u32,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if `DATABASE_URL` is missing while the PostgreSQL
        /// store is selected, or if the store type is unknown.
        pub fn from_env() -> Result<Self> {
            // ---
            let store_type = match optional_env!("RD_STORE_TYPE", "postgres").as_str() {
                "postgres" => StoreType::Postgres,
                "memory" => StoreType::Memory,
                other => anyhow::bail!("Unknown RD_STORE_TYPE: {other}"),
            };

            let database_url = match store_type {
                StoreType::Postgres => required_env!("DATABASE_URL"),
                StoreType::Memory => std::env::var("DATABASE_URL").unwrap_or_default(),
            };

            let retry_count = optional_env_parse!("RD_DB_RETRY_COUNT", u32, 50);
            let acquire_timeout_secs = optional_env_parse!("RD_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("RD_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("RD_DB_MAX_CONNECTIONS", u32, 15);

            Ok(Self {
                store_type,
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
            })
        }
    }
}
pub use database::{DatabaseConfig, StoreType};

// ============================================================
// Redis configuration
// ============================================================

mod redis {
    // ---
    use super::*;

    /// Where in-flight WebAuthn ceremony state lives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ChallengeStoreType {
        Redis,
        Memory,
    }

    /// Redis-related configuration used for WebAuthn challenges.
    #[derive(Debug, Clone)]
    pub struct RedisConfig {
        pub challenge_store: ChallengeStoreType,

        /// Redis connection string. Required for the Redis challenge store.
        pub url: String,

        /// Time-to-live for WebAuthn challenge data.
        pub webauthn_challenge_ttl: Duration,
    }

    impl RedisConfig {
        /// Builds a [`RedisConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let challenge_store = match optional_env!("RD_CHALLENGE_STORE_TYPE", "redis").as_str() {
                "redis" => ChallengeStoreType::Redis,
                "memory" => ChallengeStoreType::Memory,
                other => anyhow::bail!("Unknown RD_CHALLENGE_STORE_TYPE: {other}"),
            };

            let url = match challenge_store {
                ChallengeStoreType::Redis => required_env!("RD_REDIS_URL"),
                ChallengeStoreType::Memory => std::env::var("RD_REDIS_URL").unwrap_or_default(),
            };

            let ttl_secs = optional_env_parse!("RD_WEBAUTHN_CHALLENGE_TTL_SEC", u64, 300);

            Ok(Self {
                challenge_store,
                url,
                webauthn_challenge_ttl: Duration::from_secs(ttl_secs),
            })
        }
    }
}
pub use redis::{ChallengeStoreType, RedisConfig};

// ============================================================
// WebAuthn configuration
// ============================================================

mod webauthn {
    // ---
    use super::*;

    /// WebAuthn / Passkeys configuration.
    ///
    /// These values define the relying party identity and security
    /// origin used during WebAuthn registration and authentication.
    #[derive(Debug, Clone)]
    pub struct WebAuthnConfig {
        /// Relying Party ID (typically a domain name).
        pub rp_id: String,

        /// Human-readable Relying Party name.
        pub rp_name: String,

        /// Fully-qualified origin (e.g. https://example.com).
        pub origin: String,
    }

    impl WebAuthnConfig {
        /// Builds a [`WebAuthnConfig`] from environment variables.
        ///
        /// # Errors
        /// WebAuthn configuration is security-critical and must be explicitly provided.
        pub fn from_env() -> Result<Self> {
            // ---
            let rp_id = required_env!("RD_RP_ID");
            let origin = required_env!("RD_ORIGIN");
            let rp_name = optional_env!("RD_RP_NAME", "Rollercoaster.dev");

            Ok(Self {
                rp_id,
                rp_name,
                origin,
            })
        }
    }
}
pub use webauthn::WebAuthnConfig;

// ============================================================
// Session token configuration
// ============================================================

mod token {
    // ---
    use super::*;

    /// Minimum accepted length of the signing secret, in bytes.
    pub const MIN_SECRET_LEN: usize = 32;

    /// Signing configuration for session tokens.
    #[derive(Clone)]
    pub struct TokenConfig {
        /// HMAC secret. Also the master key for signed cookies.
        pub secret: String,

        /// Lifetime of issued tokens and of the session cookie. Defaults to 7 days.
        pub ttl: Duration,
    }

    impl std::fmt::Debug for TokenConfig {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            // ---
            f.debug_struct("TokenConfig")
                .field("secret", &"<redacted>")
                .field("ttl", &self.ttl)
                .finish()
        }
    }

    impl TokenConfig {
        /// Builds a [`TokenConfig`] from environment variables.
        ///
        /// # Errors
        /// Fails if the secret is missing or shorter than [`MIN_SECRET_LEN`].
        pub fn from_env() -> Result<Self> {
            // ---
            let secret = required_env!("RD_JWT_SECRET");
            anyhow::ensure!(
                secret.len() >= MIN_SECRET_LEN,
                "RD_JWT_SECRET must be at least {MIN_SECRET_LEN} bytes"
            );

            let ttl_secs = optional_env_parse!("RD_JWT_EXPIRY_SECONDS", u64, 7 * 24 * 60 * 60);

            Ok(Self {
                secret,
                ttl: Duration::from_secs(ttl_secs),
            })
        }
    }
}
pub use token::TokenConfig;

// ============================================================
// GitHub OAuth configuration
// ============================================================

mod github {
    // ---
    use super::*;

    #[derive(Clone)]
    pub struct GitHubConfig {
        pub client_id: String,
        pub client_secret: String,

        /// Fixed callback URL registered with the GitHub OAuth app.
        pub callback_url: String,

        /// Per-request timeout for calls to GitHub. Defaults to 10 seconds.
        pub timeout: Duration,
    }

    impl std::fmt::Debug for GitHubConfig {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            // ---
            f.debug_struct("GitHubConfig")
                .field("client_id", &self.client_id)
                .field("client_secret", &"<redacted>")
                .field("callback_url", &self.callback_url)
                .field("timeout", &self.timeout)
                .finish()
        }
    }

    impl GitHubConfig {
        /// Builds a [`GitHubConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let client_id = required_env!("RD_GITHUB_CLIENT_ID");
            let client_secret = required_env!("RD_GITHUB_CLIENT_SECRET");
            let callback_url = required_env!("RD_GITHUB_CALLBACK_URL");
            let timeout_secs = optional_env_parse!("RD_GITHUB_TIMEOUT_SEC", u64, 10);

            Ok(Self {
                client_id,
                client_secret,
                callback_url,
                timeout: Duration::from_secs(timeout_secs),
            })
        }
    }
}
pub use github::GitHubConfig;

// ============================================================
// HTTP surface configuration
// ============================================================

mod http {
    // ---

    /// Settings for cookies, redirects and optional surfaces.
    #[derive(Debug, Clone)]
    pub struct HttpConfig {
        /// Frontend base URL for post-login redirects.
        pub frontend_url: String,

        /// Mark cookies `Secure`. Enable in production.
        pub secure_cookies: bool,

        /// `prom` for Prometheus, anything else for no-op.
        pub metrics_type: String,
    }

    impl HttpConfig {
        /// Builds an [`HttpConfig`]; every field has a default.
        pub fn from_env() -> Self {
            // ---
            Self {
                frontend_url: optional_env!("RD_FRONTEND_URL", "http://localhost:5173")
                    .trim_end_matches('/')
                    .to_string(),
                secure_cookies: optional_env_parse!("RD_SECURE_COOKIES", bool, false),
                metrics_type: optional_env!("RD_METRICS_TYPE", "noop"),
            }
        }
    }
}
pub use http::HttpConfig;

// ============================================================
// Tests
// ============================================================
