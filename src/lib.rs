// src/lib.rs
use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use handlers::{health_check, metrics_handler, root_handler, track_requests};

// Public exports (visible outside this module)
pub mod auth;
pub mod domain;
pub mod error;

// Internal-only exports (sibling access within this module)
mod app_state;
mod auth_context;
mod config;
mod handlers;
mod infrastructure;

pub use app_state::{AppState, Dependencies};
pub use auth_context::AuthContext;
pub use config::*;
pub use error::{AuthError, AuthResult};
pub use handlers::{CEREMONY_COOKIE, SESSION_COOKIE, STATE_COOKIE};

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_github_client, // ---
    create_memory_challenge_store,
    create_memory_repository,
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    create_redis_challenge_store,
    create_webauthn,
    create_webauthn_verifier,
    init_database_with_retry,
};

/// Build the HTTP router with every dependency selected from environment variables.
///
/// # Errors
/// Fails on missing or invalid configuration, or if a backend cannot be reached.
pub async fn create_router() -> Result<Router> {
    // ---
    // Load all configuration from environment
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    let metrics = if config.http.metrics_type == "prom" {
        create_prom_metrics()?
    } else {
        create_noop_metrics()?
    };

    let repository = match config.database.store_type {
        StoreType::Postgres => {
            create_postgres_repository(init_database_with_retry(&config.database).await?)
        }
        StoreType::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            create_memory_repository()
        }
    };

    let challenges = match config.redis.challenge_store {
        ChallengeStoreType::Redis => create_redis_challenge_store(&config.redis.url)?,
        ChallengeStoreType::Memory => create_memory_challenge_store(),
    };

    let app_state = AppState::new(Dependencies {
        repository,
        challenges,
        verifier: create_webauthn_verifier(&config.webauthn)?,
        github: create_github_client(&config.github)?,
        mailer: auth::create_log_mailer(),
        metrics,
        token: config.token,
        challenge_ttl: config.redis.webauthn_challenge_ttl,
        http: config.http,
    });

    Ok(build_router(app_state))
}

/// Build the HTTP router around an already assembled [`AppState`].
pub fn build_router(app_state: AppState) -> Router {
    // ---
    let webauthn = Router::new()
        .route("/register/options", post(handlers::register_options))
        .route("/register/verify", post(handlers::register_verify))
        .route("/login/options", post(handlers::login_options))
        .route("/login/verify", post(handlers::login_verify))
        .route("/credentials", get(handlers::list_credentials))
        .route(
            "/credentials/{id}",
            axum::routing::delete(handlers::delete_credential)
                .patch(handlers::rename_credential),
        );

    let github = Router::new()
        .route("/login", get(handlers::github_login))
        .route("/callback", get(handlers::github_callback));

    let email = Router::new()
        .route("/send-verification", post(handlers::send_verification))
        .route("/verify", post(handlers::verify_email))
        .route(
            "/request-password-reset",
            post(handlers::request_password_reset),
        );

    let auth = Router::new()
        .nest("/webauthn", webauthn)
        .nest("/github", github)
        .nest("/email", email)
        .route("/logout", post(handlers::logout))
        .route("/me", get(handlers::me))
        .route("/status", get(handlers::status));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/auth", auth)
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            track_requests,
        ))
        .with_state(app_state)
}
