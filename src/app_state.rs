//! Application state management.
//!
//! `AppState` is the dependency-injection container handed to every handler
//! through axum's `State` extractor. It is built once at startup from
//! [`Dependencies`] and cloned per request; everything heavy sits behind `Arc`.

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use std::time::Duration;

use crate::auth::{
    IdentityResolver, MailerPtr, OAuthBridge, TokenService, VerificationService, WebAuthnEngine,
};
use crate::config::{HttpConfig, TokenConfig};
use crate::domain::{ChallengeStorePtr, GitHubApiPtr, MetricsPtr, PasskeyVerifierPtr, RepositoryPtr};

/// Everything the service needs from the outside world.
///
/// `create_router()` fills this from the environment; tests fill it with
/// in-memory stores and fakes.
pub struct Dependencies {
    // ---
    pub repository: RepositoryPtr,
    pub challenges: ChallengeStorePtr,
    pub verifier: PasskeyVerifierPtr,
    pub github: GitHubApiPtr,
    pub mailer: MailerPtr,
    pub metrics: MetricsPtr,
    pub token: TokenConfig,
    pub challenge_ttl: Duration,
    pub http: HttpConfig,
}

/// Shared application state passed to all Axum handlers.
///
/// Immutable after construction. Handlers reach the auth components through
/// accessors; the components own their own store handles.
#[derive(Clone)]
pub struct AppState {
    /// Persistent store for users, identities, credentials and tokens.
    repository: RepositoryPtr,

    /// Ceremony state store, also pinged by the full health check.
    challenges: ChallengeStorePtr,

    /// Prometheus-backed or no-op.
    metrics: MetricsPtr,

    webauthn: WebAuthnEngine,
    oauth: OAuthBridge,
    verification: VerificationService,
    tokens: TokenService,

    /// Signing key for the OAuth state and ceremony cookies.
    cookie_key: Key,

    http: HttpConfig,
    challenge_ttl: Duration,
}

/// Derive the cookie-signing key from the session secret.
fn cookie_key(secret: &str) -> Key {
    // ---
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

impl AppState {
    // ---

    pub fn new(deps: Dependencies) -> Self {
        // ---
        let tokens = TokenService::new(&deps.token);

        let webauthn = WebAuthnEngine::new(
            deps.repository.clone(),
            deps.challenges.clone(),
            deps.verifier,
            deps.metrics.clone(),
            deps.challenge_ttl,
        );
        let oauth = OAuthBridge::new(
            deps.github,
            IdentityResolver::new(deps.repository.clone()),
            tokens.clone(),
            deps.metrics.clone(),
        );
        let verification =
            VerificationService::new(deps.repository.clone(), deps.mailer, &deps.http.frontend_url);

        AppState {
            repository: deps.repository,
            challenges: deps.challenges,
            metrics: deps.metrics,
            webauthn,
            oauth,
            verification,
            tokens,
            cookie_key: cookie_key(&deps.token.secret),
            http: deps.http,
            challenge_ttl: deps.challenge_ttl,
        }
    }

    /// Get a reference to the metrics implementation.
    pub(crate) fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the repository implementation.
    pub(crate) fn repository(&self) -> &RepositoryPtr {
        // ---
        &self.repository
    }

    pub(crate) fn challenges(&self) -> &ChallengeStorePtr {
        // ---
        &self.challenges
    }

    pub(crate) fn webauthn(&self) -> &WebAuthnEngine {
        // ---
        &self.webauthn
    }

    pub(crate) fn oauth(&self) -> &OAuthBridge {
        // ---
        &self.oauth
    }

    pub(crate) fn verification(&self) -> &VerificationService {
        // ---
        &self.verification
    }

    pub(crate) fn tokens(&self) -> &TokenService {
        // ---
        &self.tokens
    }

    pub(crate) fn http(&self) -> &HttpConfig {
        // ---
        &self.http
    }

    /// Lifetime of a login ceremony, also the ceremony cookie max-age.
    pub(crate) fn challenge_ttl(&self) -> Duration {
        // ---
        self.challenge_ttl
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        // ---
        state.cookie_key.clone()
    }
}

#[cfg(test)]
mod tests {
    // ---

    use super::*;
    use crate::auth::create_log_mailer;
    use crate::domain::{GitHubApi, GitHubEmail, GitHubUser, ProviderError};
    use crate::infrastructure::{
        create_memory_challenge_store, create_memory_repository, create_noop_metrics,
        create_webauthn_verifier,
    };
    use crate::config::WebAuthnConfig;
    use std::sync::Arc;
    use url::Url;

    // Never reached from these tests, just satisfies AppState requirements
    struct UnusedGitHub;

    #[async_trait::async_trait]
    impl GitHubApi for UnusedGitHub {
        // ---
        fn authorization_url(&self, _state: &str) -> Url {
            unimplemented!()
        }
        async fn exchange_code(&self, _code: &str) -> Result<String, ProviderError> {
            unimplemented!()
        }
        async fn fetch_user(&self, _token: &str) -> Result<GitHubUser, ProviderError> {
            unimplemented!()
        }
        async fn fetch_emails(&self, _token: &str) -> Result<Vec<GitHubEmail>, ProviderError> {
            unimplemented!()
        }
    }

    fn dependencies(secret: &str) -> Dependencies {
        // ---
        let webauthn_config = WebAuthnConfig {
            rp_id: "localhost".to_string(),
            rp_name: "Test App".to_string(),
            origin: "http://localhost:8080".to_string(),
        };

        Dependencies {
            repository: create_memory_repository(),
            challenges: create_memory_challenge_store(),
            verifier: create_webauthn_verifier(&webauthn_config).unwrap(),
            github: Arc::new(UnusedGitHub),
            mailer: create_log_mailer(),
            metrics: create_noop_metrics().unwrap(),
            token: TokenConfig {
                secret: secret.to_string(),
                ttl: Duration::from_secs(3600),
            },
            challenge_ttl: Duration::from_secs(300),
            http: HttpConfig {
                frontend_url: "http://localhost:5173".to_string(),
                secure_cookies: false,
                metrics_type: "noop".to_string(),
            },
        }
    }

    #[test]
    fn test_app_state_creation_and_clone() {
        // ---
        let app_state = AppState::new(dependencies("0123456789abcdef0123456789abcdef"));
        let _cloned = app_state.clone();

        // Verify accessors work
        let _metrics_ref = app_state.metrics();
        let _repo_ref = app_state.repository();
        let _challenges_ref = app_state.challenges();
        assert_eq!(app_state.challenge_ttl(), Duration::from_secs(300));
        assert_eq!(app_state.tokens().ttl(), Duration::from_secs(3600));
        assert_eq!(app_state.http().frontend_url, "http://localhost:5173");
    }

    #[test]
    fn test_cookie_key_follows_secret() {
        // ---
        let a = AppState::new(dependencies("0123456789abcdef0123456789abcdef"));
        let b = AppState::new(dependencies("0123456789abcdef0123456789abcdef"));
        let c = AppState::new(dependencies("fedcba9876543210fedcba9876543210"));

        assert_eq!(Key::from_ref(&a).master(), Key::from_ref(&b).master());
        assert_ne!(Key::from_ref(&a).master(), Key::from_ref(&c).master());
    }

    #[tokio::test]
    async fn test_session_tokens_round_trip_through_state() {
        // ---
        let app_state = AppState::new(dependencies("0123456789abcdef0123456789abcdef"));
        let user_id = uuid::Uuid::new_v4();

        let token = app_state
            .tokens()
            .issue(user_id, Default::default())
            .unwrap();
        let claims = app_state.tokens().verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
    }
}
