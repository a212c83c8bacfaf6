use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    // ---
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    // ---
    pub fn new(username: String) -> Self {
        // ---
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username,
            email: None,
            name: None,
            avatar_url: None,
            email_verified: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Binds one external authentication method to exactly one user.
///
/// The `id` is the composite `{provider}:{provider_user_id}` and is unique
/// across the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    // ---
    pub id: String,
    pub user_id: Uuid,
    pub provider: String,
    pub provider_user_id: String,

    /// Reserved for password logins; always `None` on OAuth keys.
    pub hashed_password: Option<String>,
}

impl LinkedIdentity {
    // ---
    pub fn new(user_id: Uuid, provider: &str, provider_user_id: &str) -> Self {
        // ---
        Self {
            id: Self::key(provider, provider_user_id),
            user_id,
            provider: provider.to_string(),
            provider_user_id: provider_user_id.to_string(),
            hashed_password: None,
        }
    }

    /// Composite key for a provider identity.
    pub fn key(provider: &str, provider_user_id: &str) -> String {
        // ---
        format!("{provider}:{provider_user_id}")
    }
}

/// A registered WebAuthn authenticator (passkey).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    // ---
    /// Local row id, used by the management endpoints.
    pub id: Uuid,

    /// User this credential belongs to
    pub user_id: Uuid,

    /// Authenticator credential id, base64url without padding (unique)
    pub credential_id: String,

    /// Serialized verification material, base64url without padding
    pub public_key: String,

    /// Last accepted signature counter
    pub counter: i64,

    pub device_type: String,
    pub backed_up: bool,
    pub transports: Option<Vec<String>>,
    pub friendly_name: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Purpose tag of a [`VerificationToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Email,
    PasswordReset,
}

impl TokenKind {
    // ---
    pub fn as_str(&self) -> &'static str {
        // ---
        match self {
            TokenKind::Email => "email",
            TokenKind::PasswordReset => "password-reset",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        // ---
        match value {
            "email" => Some(TokenKind::Email),
            "password-reset" => Some(TokenKind::PasswordReset),
            _ => None,
        }
    }
}

/// Single-use, hashed out-of-band token (email verification, password reset).
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationToken {
    // ---
    pub id: Uuid,
    pub user_id: Uuid,

    /// SHA-256 of the plaintext token, hex encoded
    pub token_hash: String,

    pub kind: TokenKind,

    /// Address awaiting confirmation. Only email tokens carry one.
    pub email: Option<String>,

    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    // ---
    pub fn new(user_id: Uuid, kind: TokenKind, token_hash: String, ttl: Duration) -> Self {
        // ---
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash,
            kind,
            email: None,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    /// Attach the address this token confirms.
    pub fn with_email(mut self, email: &str) -> Self {
        // ---
        self.email = Some(email.to_string());
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        // ---
        now > self.expires_at
    }
}

/// Normalized third-party profile handed to the identity resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    // ---
    pub provider: String,
    pub provider_user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Result of the atomic user + identity insertion.
#[derive(Debug, Clone, PartialEq)]
pub enum NewIdentityOutcome {
    // ---
    Created(User),

    /// The composite identity key was inserted concurrently by someone else.
    IdentityExists,

    UsernameTaken,
    EmailTaken,
}
