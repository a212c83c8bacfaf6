use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

/// Failure talking to the OAuth provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    // ---
    #[error("request to {endpoint} failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },

    #[error("{endpoint} answered {status}")]
    Status { endpoint: &'static str, status: u16 },

    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

/// Profile as returned by `GET /user`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GitHubUser {
    // ---
    pub id: i64,
    pub login: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// One entry of `GET /user/emails`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GitHubEmail {
    // ---
    pub email: String,
    pub primary: bool,
    pub verified: bool,
    pub visibility: Option<String>,
}

/// The slice of the GitHub API used by the OAuth bridge.
#[async_trait::async_trait]
pub trait GitHubApi: Send + Sync {
    // ---
    /// Authorization URL carrying `state`, the fixed callback and the required scopes.
    fn authorization_url(&self, state: &str) -> Url;

    /// Exchange an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError>;

    async fn fetch_user(&self, access_token: &str) -> Result<GitHubUser, ProviderError>;

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<GitHubEmail>, ProviderError>;
}

pub type GitHubApiPtr = Arc<dyn GitHubApi>;
