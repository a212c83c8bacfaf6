//! OAuth Bridge: the GitHub authorization-code flow.

use rand::RngCore;
use url::Url;

use super::identity::IdentityResolver;
use super::token::{ProfileClaims, TokenService};
use crate::domain::{AuthMethod, GitHubApiPtr, MetricsPtr, ProviderError, ProviderProfile, User};
use crate::error::{AuthError, AuthResult};

pub const GITHUB_PROVIDER: &str = "github";

/// Where to send the user-agent, and the state to remember until it returns.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    // ---
    pub state: String,
    pub authorization_url: Url,
}

/// Outcome of a successful callback.
#[derive(Debug, Clone)]
pub struct OAuthLogin {
    // ---
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct OAuthBridge {
    // ---
    github: GitHubApiPtr,
    identities: IdentityResolver,
    tokens: TokenService,
    metrics: MetricsPtr,
}

impl OAuthBridge {
    // ---
    pub fn new(
        github: GitHubApiPtr,
        identities: IdentityResolver,
        tokens: TokenService,
        metrics: MetricsPtr,
    ) -> Self {
        // ---
        Self {
            github,
            identities,
            tokens,
            metrics,
        }
    }

    /// Fresh random state and the authorization URL that carries it.
    pub fn initiate_login(&self) -> LoginRedirect {
        // ---
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let state = hex::encode(bytes);

        LoginRedirect {
            authorization_url: self.github.authorization_url(&state),
            state,
        }
    }

    /// Complete the flow started by [`initiate_login`](Self::initiate_login).
    ///
    /// Checks run in a fixed order and stop at the first failure. The state
    /// comparison comes first and no request reaches GitHub unless it passed.
    pub async fn handle_callback(
        &self,
        code: Option<&str>,
        stored_state: Option<&str>,
        received_state: Option<&str>,
    ) -> AuthResult<OAuthLogin> {
        // ---
        let result = self.callback(code, stored_state, received_state).await;
        self.metrics
            .record_auth_attempt(AuthMethod::GitHub, result.is_ok());
        result
    }

    async fn callback(
        &self,
        code: Option<&str>,
        stored_state: Option<&str>,
        received_state: Option<&str>,
    ) -> AuthResult<OAuthLogin> {
        // ---
        match (stored_state, received_state) {
            (Some(stored), Some(received))
                if !stored.is_empty() && constant_time_eq(stored, received) => {}
            (stored, received) => {
                tracing::warn!(
                    "OAuth callback rejected: state invalid (cookie present: {}, query present: {})",
                    stored.is_some(),
                    received.is_some()
                );
                return Err(AuthError::InvalidState);
            }
        }

        let code = code.filter(|c| !c.is_empty()).ok_or_else(|| {
            tracing::warn!("OAuth callback rejected: no authorization code");
            AuthError::MissingCode
        })?;

        let access_token = self
            .github
            .exchange_code(code)
            .await
            .map_err(upstream_error)?;

        let github_user = self
            .github
            .fetch_user(&access_token)
            .await
            .map_err(upstream_error)?;

        let email = match github_user.email.clone().filter(|e| !e.is_empty()) {
            Some(email) => Some(email),
            None => self
                .github
                .fetch_emails(&access_token)
                .await
                .map_err(upstream_error)?
                .into_iter()
                .find(|e| e.primary && e.verified)
                .map(|e| e.email),
        };

        let Some(email) = email else {
            tracing::warn!(
                "OAuth callback rejected: GitHub user {} has no verified primary email",
                github_user.id
            );
            return Err(AuthError::EmailUnverified);
        };

        let profile = ProviderProfile {
            provider: GITHUB_PROVIDER.to_string(),
            provider_user_id: github_user.id.to_string(),
            email: Some(email),
            username: Some(github_user.login),
            name: github_user.name,
            avatar_url: github_user.avatar_url,
        };

        let user = self.identities.find_or_create(&profile).await?;
        let token = self.tokens.issue(user.id, ProfileClaims::from(&user))?;

        tracing::info!("GitHub login for user {}", user.id);
        Ok(OAuthLogin { user, token })
    }
}

fn upstream_error(err: ProviderError) -> AuthError {
    // ---
    match err {
        ProviderError::Rejected(reason) => {
            tracing::warn!("GitHub rejected the authorization: {}", reason);
            AuthError::VerificationFailed(format!("provider rejected: {reason}"))
        }
        other => {
            tracing::error!("GitHub request failed: {}", other);
            AuthError::UpstreamProvider(other.to_string())
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    // ---
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}
