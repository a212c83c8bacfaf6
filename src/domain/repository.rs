use super::models::{
    Credential, LinkedIdentity, NewIdentityOutcome, TokenKind, User, VerificationToken,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Persistence for users, linked identities, passkeys and verification tokens.
///
/// Implementations must enforce uniqueness of usernames, emails, composite
/// identity keys and credential ids themselves; callers rely on the outcome
/// values below rather than checking first.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // ---
    /// Get user by ID.
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Get user by email (exact match).
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up a linked identity by provider and provider-side id.
    async fn find_linked_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<LinkedIdentity>>;

    /// Insert a user and its first linked identity in one transaction.
    async fn insert_user_and_linked_identity(
        &self,
        user: User,
        identity: LinkedIdentity,
    ) -> Result<NewIdentityOutcome>;

    /// Bind an identity to an existing user. Returns `false` when the
    /// composite key already exists.
    async fn link_identity(&self, identity: LinkedIdentity) -> Result<bool>;

    /// Set a confirmed address on the user and stamp it verified at `at`.
    ///
    /// An unverified holder of the same address loses it. Returns `false`
    /// when another user holds it verified.
    async fn set_verified_email(&self, user_id: Uuid, email: &str, at: DateTime<Utc>)
        -> Result<bool>;

    /// Clear `email` from a user who never verified it. Returns `true` if a
    /// row was released.
    async fn release_unverified_email(&self, email: &str) -> Result<bool>;

    /// Save a new credential. Returns `false` if the credential id is already registered.
    async fn save_credential(&self, credential: Credential) -> Result<bool>;

    /// Get all credentials for a user.
    async fn get_credentials_by_user(&self, user_id: Uuid) -> Result<Vec<Credential>>;

    /// Get a credential by its authenticator id (base64url).
    async fn find_credential_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Credential>>;

    /// Get a credential by its local row id.
    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>>;

    /// Advance the signature counter with compare-and-swap semantics.
    ///
    /// Succeeds only while the stored counter still equals `expected_counter`;
    /// returns `false` otherwise, leaving the row untouched.
    async fn update_credential_counter(
        &self,
        credential_id: &str,
        expected_counter: i64,
        new_counter: i64,
        public_key: &str,
        backed_up: bool,
    ) -> Result<bool>;

    /// Rename a credential owned by `user_id`. Returns `false` if no such row.
    async fn rename_credential(&self, id: Uuid, user_id: Uuid, friendly_name: &str)
        -> Result<bool>;

    /// Delete a credential owned by `user_id`. Returns `false` if no such row.
    async fn delete_credential(&self, id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Store a verification token, removing older tokens of the same kind for the user.
    async fn replace_verification_token(&self, token: VerificationToken) -> Result<()>;

    /// Remove and return the matching token, if any.
    async fn take_verification_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>>;
}

/// Type alias for any backend that implements Repository.
pub type RepositoryPtr = Arc<dyn Repository>;
