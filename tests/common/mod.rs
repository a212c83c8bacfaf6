// Test helpers are intentionally partially used
#![allow(dead_code)]

//! In-process test harness: the real router over in-memory stores, a fake
//! passkey verifier and a fake GitHub.

use anyhow::{anyhow, ensure, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rd_auth::auth::{Mailer, OutgoingMail, ProfileClaims, TokenService};
use rd_auth::domain::{
    CeremonyChallenge, Credential, GitHubApi, GitHubEmail, GitHubUser, LinkedIdentity,
    NewIdentityOutcome, PasskeyVerifier, ProviderError, RegisteredPasskey, RepositoryPtr, User,
    VerifiedAssertion,
};
use rd_auth::{
    build_router, create_memory_challenge_store, create_memory_repository, create_noop_metrics,
    AppState, Dependencies, HttpConfig, TokenConfig,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;

pub const SECRET: &str = "integration-secret-integration-secret";
pub const FRONTEND: &str = "http://localhost:5173";

// ============================================================================
// Fakes
// ============================================================================

/// Verifier that checks the challenge echo and trusts the presented counter.
///
/// Responses look like `{ "id", "challenge", "counter", "signature"? }`.
pub struct FakeVerifier;

fn challenge_of(value: &Value) -> Result<&str> {
    // ---
    value["challenge"]
        .as_str()
        .ok_or_else(|| anyhow!("no challenge"))
}

impl PasskeyVerifier for FakeVerifier {
    // ---
    fn start_registration(
        &self,
        _user_id: Uuid,
        _username: &str,
        _display_name: &str,
        existing: &[Credential],
    ) -> Result<CeremonyChallenge> {
        // ---
        let challenge = Uuid::new_v4().to_string();
        let exclude: Vec<&str> = existing.iter().map(|c| c.credential_id.as_str()).collect();
        Ok(CeremonyChallenge {
            options: json!({ "challenge": challenge, "excludeCredentials": exclude }),
            state: json!({ "challenge": challenge }),
        })
    }

    fn finish_registration(&self, response: &Value, state: &Value) -> Result<RegisteredPasskey> {
        // ---
        ensure!(challenge_of(response)? == challenge_of(state)?, "challenge mismatch");
        let id = response["id"].as_str().ok_or_else(|| anyhow!("no id"))?;
        Ok(RegisteredPasskey {
            credential_id: URL_SAFE_NO_PAD.decode(id)?,
            public_key: b"fake-public-key".to_vec(),
            counter: response["counter"].as_u64().unwrap_or(0) as u32,
            backed_up: true,
            device_type: "multiDevice".into(),
            transports: Some(vec!["internal".into(), "hybrid".into()]),
        })
    }

    fn start_authentication(&self, allowed: Option<&[Credential]>) -> Result<CeremonyChallenge> {
        // ---
        let challenge = Uuid::new_v4().to_string();
        let allow: Vec<&str> = allowed
            .unwrap_or_default()
            .iter()
            .map(|c| c.credential_id.as_str())
            .collect();
        Ok(CeremonyChallenge {
            options: json!({ "challenge": challenge, "allowCredentials": allow }),
            state: json!({ "challenge": challenge }),
        })
    }

    fn finish_authentication(
        &self,
        response: &Value,
        state: &Value,
        credential: &Credential,
    ) -> Result<VerifiedAssertion> {
        // ---
        ensure!(challenge_of(response)? == challenge_of(state)?, "challenge mismatch");
        ensure!(response["signature"] != "bad", "bad signature");
        Ok(VerifiedAssertion {
            credential_id: URL_SAFE_NO_PAD.decode(&credential.credential_id)?,
            counter: response["counter"].as_u64().unwrap_or(0) as u32,
            backed_up: true,
            public_key: URL_SAFE_NO_PAD.decode(&credential.public_key)?,
        })
    }
}

/// GitHub stand-in returning one configured account and recording calls.
pub struct FakeGitHub {
    // ---
    pub user: Mutex<GitHubUser>,
    pub emails: Mutex<Vec<GitHubEmail>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FakeGitHub {
    // ---
    pub fn new() -> Self {
        // ---
        Self {
            user: Mutex::new(GitHubUser {
                id: 583231,
                login: "octocat".into(),
                email: None,
                name: Some("The Octocat".into()),
                avatar_url: Some("https://avatars.example/583231".into()),
            }),
            emails: Mutex::new(vec![
                GitHubEmail {
                    email: "octocat@example.com".into(),
                    primary: true,
                    verified: true,
                    visibility: Some("private".into()),
                },
                GitHubEmail {
                    email: "octo-old@example.com".into(),
                    primary: false,
                    verified: true,
                    visibility: None,
                },
            ]),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl GitHubApi for FakeGitHub {
    // ---
    fn authorization_url(&self, state: &str) -> Url {
        // ---
        let mut url = Url::parse("https://github.test/login/oauth/authorize").unwrap();
        url.query_pairs_mut()
            .append_pair("scope", "read:user user:email")
            .append_pair("state", state);
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<String, ProviderError> {
        // ---
        self.record("exchange_code");
        tokio::time::sleep(Duration::from_millis(5)).await;
        match code {
            "expired" => Err(ProviderError::Rejected("bad_verification_code".into())),
            "outage" => Err(ProviderError::Status {
                endpoint: "access_token",
                status: 503,
            }),
            _ => Ok(format!("gho_{code}")),
        }
    }

    async fn fetch_user(&self, _token: &str) -> Result<GitHubUser, ProviderError> {
        // ---
        self.record("fetch_user");
        Ok(self.user.lock().unwrap().clone())
    }

    async fn fetch_emails(&self, _token: &str) -> Result<Vec<GitHubEmail>, ProviderError> {
        // ---
        self.record("fetch_emails");
        Ok(self.emails.lock().unwrap().clone())
    }
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<OutgoingMail>>,
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

// ============================================================================
// Test application
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub repo: RepositoryPtr,
    pub github: Arc<FakeGitHub>,
    pub mailer: Arc<RecordingMailer>,
    pub tokens: TokenService,
}

/// A response with its body already read.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestResponse {
    // ---
    /// `name=value` pairs from `Set-Cookie`, cleared cookies included as empty.
    pub fn set_cookies(&self) -> HashMap<String, String> {
        // ---
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect()
    }

    pub fn location(&self) -> String {
        // ---
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}

impl TestApp {
    // ---
    pub fn new() -> Self {
        // ---
        let repo = create_memory_repository();
        let github = Arc::new(FakeGitHub::new());
        let mailer = Arc::new(RecordingMailer::default());
        let token = TokenConfig {
            secret: SECRET.to_string(),
            ttl: Duration::from_secs(3600),
        };
        let tokens = TokenService::new(&token);

        let state = AppState::new(Dependencies {
            repository: repo.clone(),
            challenges: create_memory_challenge_store(),
            verifier: Arc::new(FakeVerifier),
            github: github.clone(),
            mailer: mailer.clone(),
            metrics: create_noop_metrics().unwrap(),
            token,
            challenge_ttl: Duration::from_secs(300),
            http: HttpConfig {
                frontend_url: FRONTEND.to_string(),
                secure_cookies: false,
                metrics_type: "noop".to_string(),
            },
        });

        Self {
            router: build_router(state),
            repo,
            github,
            mailer,
            tokens,
        }
    }

    /// Send one request; `cookies` become a `Cookie` header.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookies: &[(&str, &str)],
    ) -> TestResponse {
        // ---
        let mut builder = Request::builder().method(method).uri(uri);
        if !cookies.is_empty() {
            let header_value = cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, header_value);
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        read(self.router.clone().oneshot(request).await.unwrap()).await
    }

    /// Create a user linked to a throwaway GitHub identity.
    pub async fn create_user(&self, username: &str) -> User {
        // ---
        let mut user = User::new(username.to_string());
        user.email = Some(format!("{username}@example.com"));
        let identity = LinkedIdentity::new(user.id, "github", &Uuid::new_v4().to_string());

        match self
            .repo
            .insert_user_and_linked_identity(user, identity)
            .await
            .unwrap()
        {
            NewIdentityOutcome::Created(user) => user,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    /// A valid session token for `user`.
    pub fn token_for(&self, user: &User) -> String {
        // ---
        self.tokens.issue(user.id, ProfileClaims::from(user)).unwrap()
    }

    /// Register a passkey for `user` through the HTTP ceremony.
    pub async fn register_passkey(
        &self,
        session: &str,
        raw_id: &[u8],
        friendly_name: Option<&str>,
    ) -> TestResponse {
        // ---
        let cookies = [(rd_auth::SESSION_COOKIE, session)];
        let options = self
            .request(Method::POST, "/auth/webauthn/register/options", None, &cookies)
            .await;
        assert_eq!(options.status, StatusCode::OK);

        let response = json!({
            "id": URL_SAFE_NO_PAD.encode(raw_id),
            "challenge": options.body["challenge"],
            "counter": 0,
        });
        let mut body = json!({ "response": response });
        if let Some(name) = friendly_name {
            body["friendlyName"] = json!(name);
        }

        self.request(
            Method::POST,
            "/auth/webauthn/register/verify",
            Some(body),
            &cookies,
        )
        .await
    }

    /// Start a login ceremony; returns the options and the ceremony cookie.
    pub async fn login_options(&self, body: Option<Value>) -> (Value, String) {
        // ---
        let response = self
            .request(Method::POST, "/auth/webauthn/login/options", body, &[])
            .await;
        assert_eq!(response.status, StatusCode::OK);
        let ceremony = response
            .set_cookies()
            .remove(rd_auth::CEREMONY_COOKIE)
            .expect("ceremony cookie set");
        (response.body, ceremony)
    }

    /// Answer a login ceremony with an assertion carrying `counter`.
    pub async fn login_verify(
        &self,
        ceremony: &str,
        raw_id: &[u8],
        challenge: &Value,
        counter: u32,
    ) -> TestResponse {
        // ---
        let assertion = json!({
            "id": URL_SAFE_NO_PAD.encode(raw_id),
            "challenge": challenge,
            "counter": counter,
        });
        self.request(
            Method::POST,
            "/auth/webauthn/login/verify",
            Some(assertion),
            &[(rd_auth::CEREMONY_COOKIE, ceremony)],
        )
        .await
    }
}

async fn read(response: Response<Body>) -> TestResponse {
    // ---
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    TestResponse {
        status,
        headers,
        body,
    }
}
