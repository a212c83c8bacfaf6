//! GitHub OAuth and REST client over reqwest.

use anyhow::{Context, Result};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::config::GitHubConfig;
use crate::domain::{GitHubApi, GitHubApiPtr, GitHubEmail, GitHubUser, ProviderError};

const OAUTH_BASE: &str = "https://github.com/login/oauth/";
const API_BASE: &str = "https://api.github.com/";
const USER_AGENT: &str = "rollercoaster.dev";
const SCOPES: &str = "read:user user:email";

const TOKEN_ENDPOINT: &str = "access_token";
const USER_ENDPOINT: &str = "user";
const EMAILS_ENDPOINT: &str = "user/emails";

/// Body of the token exchange; GitHub answers 200 with `error` on bad codes.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub struct GitHubClient {
    // ---
    http: Client,
    client_id: String,
    client_secret: String,
    callback_url: String,
    oauth_base: Url,
    api_base: Url,
}

/// Creates the GitHub client for the configured OAuth app.
///
/// # Errors
/// Fails if the HTTP client cannot be built.
pub fn create_github_client(config: &GitHubConfig) -> Result<GitHubApiPtr> {
    // ---
    let client =
        GitHubClient::with_endpoints(config, Url::parse(OAUTH_BASE)?, Url::parse(API_BASE)?)?;
    Ok(Arc::new(client))
}

impl GitHubClient {
    // ---
    pub(crate) fn with_endpoints(
        config: &GitHubConfig,
        oauth_base: Url,
        api_base: Url,
    ) -> Result<Self> {
        // ---
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .context("failed to build GitHub HTTP client")?;

        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
            oauth_base,
            api_base,
        })
    }

    fn endpoint(base: &Url, path: &'static str) -> Result<Url, ProviderError> {
        // ---
        base.join(path).map_err(|e| ProviderError::Transport {
            endpoint: path,
            message: e.to_string(),
        })
    }

    async fn checked(
        endpoint: &'static str,
        result: reqwest::Result<Response>,
    ) -> Result<Response, ProviderError> {
        // ---
        let response = result.map_err(|e| ProviderError::Transport {
            endpoint,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("GitHub {} answered {}", endpoint, status);
            return Err(ProviderError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &'static str,
        access_token: &str,
    ) -> Result<T, ProviderError> {
        // ---
        let url = Self::endpoint(&self.api_base, endpoint)?;
        let result = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await;

        Self::checked(endpoint, result)
            .await?
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Transport {
                endpoint,
                message: format!("unreadable body: {e}"),
            })
    }
}

#[async_trait::async_trait]
impl GitHubApi for GitHubClient {
    // ---
    fn authorization_url(&self, state: &str) -> Url {
        // ---
        let mut url = self.oauth_base.clone();
        url.set_path(&format!("{}authorize", self.oauth_base.path()));
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.callback_url)
            .append_pair("scope", SCOPES)
            .append_pair("state", state);
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        // ---
        let url = Self::endpoint(&self.oauth_base, TOKEN_ENDPOINT)?;
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.callback_url.as_str()),
        ];
        let result = self
            .http
            .post(url)
            .header(header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await;

        let body: TokenResponse = Self::checked(TOKEN_ENDPOINT, result)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Transport {
                endpoint: TOKEN_ENDPOINT,
                message: format!("unreadable body: {e}"),
            })?;

        match body {
            TokenResponse {
                access_token: Some(token),
                error: None,
                ..
            } if !token.is_empty() => Ok(token),
            TokenResponse {
                error,
                error_description,
                ..
            } => Err(ProviderError::Rejected(
                error_description
                    .or(error)
                    .unwrap_or_else(|| "no access token issued".to_string()),
            )),
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GitHubUser, ProviderError> {
        // ---
        self.get_json(USER_ENDPOINT, access_token).await
    }

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<GitHubEmail>, ProviderError> {
        // ---
        self.get_json(EMAILS_ENDPOINT, access_token).await
    }
}
