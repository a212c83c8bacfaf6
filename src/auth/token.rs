//! Signed, stateless session tokens (HS256 JWT).
//!
//! Tokens are never persisted. Validity is the signature plus `exp`; there is
//! no revocation list, so logout only clears the client cookie.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::domain::User;
use crate::error::{AuthError, AuthResult};

/// Profile claims carried alongside `sub`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileClaims {
    // ---
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&User> for ProfileClaims {
    fn from(user: &User) -> Self {
        // ---
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Full claim set of a session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    // ---
    /// Subject: the user id.
    pub sub: String,

    #[serde(flatten)]
    pub profile: ProfileClaims,

    /// Issued at (unix seconds).
    pub iat: i64,

    /// Expiry (unix seconds).
    pub exp: i64,
}

impl SessionClaims {
    // ---
    /// The subject parsed as a user id.
    pub fn user_id(&self) -> AuthResult<Uuid> {
        // ---
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::TokenInvalid("subject is not a user id".into()))
    }
}

/// Issues and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    // ---
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    // ---
    pub fn new(config: &TokenConfig) -> Self {
        // ---
        Self::from_secret(config.secret.as_bytes(), config.ttl)
    }

    pub fn from_secret(secret: &[u8], ttl: Duration) -> Self {
        // ---
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Token lifetime, also used as the session cookie max-age.
    pub fn ttl(&self) -> Duration {
        // ---
        self.ttl
    }

    /// Sign a token for `user_id` carrying `profile`, expiring `ttl` from now.
    pub fn issue(&self, user_id: Uuid, profile: ProfileClaims) -> AuthResult<String> {
        // ---
        self.issue_at(user_id, profile, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        profile: ProfileClaims,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        // ---
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            profile,
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };

        tracing::debug!("Issuing session token for user {}", claims.sub);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature and expiry and return the claims.
    ///
    /// Expired and otherwise invalid tokens produce distinct errors; both map
    /// to a plain 401 at the HTTP boundary.
    pub fn verify(&self, token: &str) -> AuthResult<SessionClaims> {
        // ---
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => {
                    tracing::info!("Session token rejected: expired");
                    AuthError::TokenExpired
                }
                ErrorKind::InvalidSignature => {
                    tracing::warn!("Session token rejected: signature mismatch");
                    AuthError::TokenInvalid("signature mismatch".into())
                }
                other => {
                    tracing::warn!("Session token rejected: {:?}", other);
                    AuthError::TokenInvalid("malformed token".into())
                }
            }
        })?;

        // A token is dead at its expiry second, not one second later.
        if data.claims.exp <= Utc::now().timestamp() {
            tracing::info!("Session token rejected: expired");
            return Err(AuthError::TokenExpired);
        }

        Ok(data.claims)
    }
}
