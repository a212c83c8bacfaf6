//! WebAuthn Engine: passkey ceremonies and credential management.
//!
//! Each ceremony is two requests. The first stores the verifier state in the
//! challenge store and hands options to the browser; the second consumes that
//! state exactly once (success or failure) and verifies the browser's answer.
//!
//! Counter policy: an assertion must present a counter strictly greater than
//! the stored one. The only exception is an authenticator that reports `0`
//! on every use ("counter unsupported"); such a credential is accepted while
//! both values stay `0`, which disables clone detection for it. A credential
//! that ever reported a non-zero counter can never fall back to `0`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    AuthMethod, ChallengeStorePtr, Credential, MetricsPtr, PasskeyVerifierPtr, RepositoryPtr, User,
};
use crate::error::{AuthError, AuthResult};

/// Longest accepted friendly name, in characters.
pub const MAX_FRIENDLY_NAME_LEN: usize = 100;

fn registration_key(user_id: Uuid) -> String {
    // ---
    format!("webauthn:reg:{user_id}")
}

fn authentication_key(ceremony_id: &str) -> String {
    // ---
    format!("webauthn:auth:{ceremony_id}")
}

/// Default name for a credential registered without one.
pub fn default_friendly_name() -> String {
    // ---
    format!("Credential {}", Utc::now().format("%Y-%m-%d"))
}

#[derive(Clone)]
pub struct WebAuthnEngine {
    // ---
    repository: RepositoryPtr,
    challenges: ChallengeStorePtr,
    verifier: PasskeyVerifierPtr,
    metrics: MetricsPtr,
    challenge_ttl: Duration,
}

impl WebAuthnEngine {
    // ---
    pub fn new(
        repository: RepositoryPtr,
        challenges: ChallengeStorePtr,
        verifier: PasskeyVerifierPtr,
        metrics: MetricsPtr,
        challenge_ttl: Duration,
    ) -> Self {
        // ---
        Self {
            repository,
            challenges,
            verifier,
            metrics,
            challenge_ttl,
        }
    }

    // ============================================================================
    // Registration
    // ============================================================================

    /// Creation options for a new passkey of `user`.
    ///
    /// The user's existing credentials are excluded so the same authenticator
    /// cannot be registered twice. Issuing new options replaces any pending
    /// registration challenge of this user.
    pub async fn generate_registration_options(&self, user: &User) -> AuthResult<Value> {
        // ---
        let existing = self.repository.get_credentials_by_user(user.id).await?;
        let display_name = user.name.as_deref().unwrap_or(&user.username);

        let challenge = self
            .verifier
            .start_registration(user.id, &user.username, display_name, &existing)
            .map_err(|e| AuthError::Internal(format!("start registration: {e:#}")))?;

        self.park_state(&registration_key(user.id), &challenge.state)
            .await?;

        tracing::info!(
            "Registration options issued for user {} ({} existing credentials)",
            user.id,
            existing.len()
        );
        Ok(challenge.options)
    }

    /// Verify an attestation and persist the new credential.
    ///
    /// Fails closed: nothing is stored unless verification fully succeeded.
    pub async fn verify_registration(
        &self,
        user_id: Uuid,
        response: &Value,
        friendly_name: Option<&str>,
    ) -> AuthResult<Credential> {
        // ---
        let result = self.register(user_id, response, friendly_name).await;
        self.metrics
            .record_auth_attempt(AuthMethod::PasskeyRegistration, result.is_ok());
        result
    }

    async fn register(
        &self,
        user_id: Uuid,
        response: &Value,
        friendly_name: Option<&str>,
    ) -> AuthResult<Credential> {
        // ---
        let state = self.consume_state(&registration_key(user_id)).await?;

        let passkey = self
            .verifier
            .finish_registration(response, &state)
            .map_err(|e| {
                tracing::warn!("Registration verification failed for user {}: {:#}", user_id, e);
                AuthError::VerificationFailed(format!("{e:#}"))
            })?;

        let friendly_name = match friendly_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => validate_friendly_name(name)?,
            None => default_friendly_name(),
        };

        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            user_id,
            credential_id: URL_SAFE_NO_PAD.encode(&passkey.credential_id),
            public_key: URL_SAFE_NO_PAD.encode(&passkey.public_key),
            counter: i64::from(passkey.counter),
            device_type: passkey.device_type,
            backed_up: passkey.backed_up,
            transports: passkey.transports,
            friendly_name,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        };

        if !self.repository.save_credential(credential.clone()).await? {
            tracing::warn!(
                "Registration rejected for user {}: credential already registered",
                user_id
            );
            return Err(AuthError::VerificationFailed(
                "credential already registered".into(),
            ));
        }

        tracing::info!(
            "Registered credential {} for user {}",
            credential.id,
            user_id
        );
        Ok(credential)
    }

    // ============================================================================
    // Authentication
    // ============================================================================

    /// Request options for a login ceremony identified by `ceremony_id`.
    ///
    /// With a known user that has credentials, `allowCredentials` lists them;
    /// otherwise the ceremony is discoverable and any resident passkey of this
    /// relying party may answer.
    pub async fn generate_authentication_options(
        &self,
        ceremony_id: &str,
        user_id: Option<Uuid>,
    ) -> AuthResult<Value> {
        // ---
        let allowed = match user_id {
            Some(user_id) => self.repository.get_credentials_by_user(user_id).await?,
            None => Vec::new(),
        };

        let challenge = if allowed.is_empty() {
            self.verifier.start_authentication(None)
        } else {
            self.verifier.start_authentication(Some(&allowed))
        }
        .map_err(|e| AuthError::Internal(format!("start authentication: {e:#}")))?;

        self.park_state(&authentication_key(ceremony_id), &challenge.state)
            .await?;

        tracing::info!(
            "Authentication options issued ({} allowed credentials)",
            allowed.len()
        );
        Ok(challenge.options)
    }

    /// Drop a pending login challenge, if any.
    pub async fn discard_authentication(&self, ceremony_id: &str) -> AuthResult<()> {
        // ---
        self.challenges
            .discard(&authentication_key(ceremony_id))
            .await?;
        Ok(())
    }

    /// Verify an assertion and return the credential's owner.
    ///
    /// The stored counter only moves when every check passed, and it moves by
    /// compare-and-swap, so two concurrent uses of one assertion cannot both win.
    pub async fn verify_authentication(
        &self,
        ceremony_id: &str,
        response: &Value,
    ) -> AuthResult<User> {
        // ---
        let result = self.authenticate(ceremony_id, response).await;
        self.metrics
            .record_auth_attempt(AuthMethod::PasskeyLogin, result.is_ok());
        result
    }

    async fn authenticate(&self, ceremony_id: &str, response: &Value) -> AuthResult<User> {
        // ---
        let state = self.consume_state(&authentication_key(ceremony_id)).await?;

        let credential_id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::InvalidRequest("assertion has no credential id".into()))?;

        let credential = self
            .repository
            .find_credential_by_credential_id(credential_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Assertion for unknown credential");
                AuthError::CredentialNotFound
            })?;

        let assertion = self
            .verifier
            .finish_authentication(response, &state, &credential)
            .map_err(|e| {
                tracing::warn!(
                    "Assertion verification failed for credential {}: {:#}",
                    credential.id,
                    e
                );
                AuthError::VerificationFailed(format!("{e:#}"))
            })?;

        let stored = credential.counter;
        let presented = i64::from(assertion.counter);
        if !counter_advances(stored, presented) {
            return Err(self.counter_replay(&credential, stored, presented));
        }

        let swapped = self
            .repository
            .update_credential_counter(
                &credential.credential_id,
                stored,
                presented,
                &URL_SAFE_NO_PAD.encode(&assertion.public_key),
                assertion.backed_up,
            )
            .await?;
        if !swapped {
            // Another assertion for this credential was accepted in between.
            return Err(self.counter_replay(&credential, stored, presented));
        }

        let user = self
            .repository
            .get_user_by_id(credential.user_id)
            .await?
            .ok_or_else(|| {
                AuthError::Internal(format!("credential {} has no owner", credential.id))
            })?;

        tracing::info!(
            "Passkey login for user {} with credential {}",
            user.id,
            credential.id
        );
        Ok(user)
    }

    fn counter_replay(&self, credential: &Credential, stored: i64, presented: i64) -> AuthError {
        // ---
        tracing::error!(
            "Signature counter replay on credential {} of user {} (stored {}, presented {}); possible cloned authenticator",
            credential.id,
            credential.user_id,
            stored,
            presented
        );
        self.metrics.record_counter_replay();
        AuthError::CounterReplay { stored, presented }
    }

    // ============================================================================
    // Credential management
    // ============================================================================

    pub async fn list_credentials(&self, user_id: Uuid) -> AuthResult<Vec<Credential>> {
        // ---
        Ok(self.repository.get_credentials_by_user(user_id).await?)
    }

    /// Delete credential `id`, which must belong to `user_id`.
    pub async fn delete_credential(&self, user_id: Uuid, id: Uuid) -> AuthResult<()> {
        // ---
        self.owned_credential(user_id, id).await?;

        if !self.repository.delete_credential(id, user_id).await? {
            return Err(AuthError::InvalidRequest("credential not found".into()));
        }

        tracing::info!("Deleted credential {} of user {}", id, user_id);
        Ok(())
    }

    /// Rename credential `id`, which must belong to `user_id`.
    pub async fn rename_credential(
        &self,
        user_id: Uuid,
        id: Uuid,
        friendly_name: &str,
    ) -> AuthResult<()> {
        // ---
        let friendly_name = validate_friendly_name(friendly_name.trim())?;
        self.owned_credential(user_id, id).await?;

        if !self
            .repository
            .rename_credential(id, user_id, &friendly_name)
            .await?
        {
            return Err(AuthError::InvalidRequest("credential not found".into()));
        }

        tracing::info!("Renamed credential {} of user {}", id, user_id);
        Ok(())
    }

    async fn owned_credential(&self, user_id: Uuid, id: Uuid) -> AuthResult<Credential> {
        // ---
        let credential = self
            .repository
            .get_credential(id)
            .await?
            .ok_or_else(|| AuthError::InvalidRequest("credential not found".into()))?;

        if credential.user_id != user_id {
            tracing::warn!(
                "User {} attempted to modify credential {} of another user",
                user_id,
                id
            );
            return Err(AuthError::Forbidden(
                "credential does not belong to user".into(),
            ));
        }

        Ok(credential)
    }

    // ============================================================================
    // Challenge state
    // ============================================================================

    async fn park_state(&self, key: &str, state: &Value) -> AuthResult<()> {
        // ---
        let bytes = serde_json::to_vec(state)
            .map_err(|e| AuthError::Internal(format!("serialize ceremony state: {e}")))?;
        self.challenges.put(key, bytes, self.challenge_ttl).await?;
        Ok(())
    }

    /// Read-once: the entry is gone after this call whatever happens next.
    async fn consume_state(&self, key: &str) -> AuthResult<Value> {
        // ---
        let bytes = self.challenges.take(key).await?.ok_or_else(|| {
            tracing::warn!("Ceremony challenge missing or expired");
            AuthError::ChallengeExpired
        })?;

        serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::Internal(format!("deserialize ceremony state: {e}")))
    }
}

fn counter_advances(stored: i64, presented: i64) -> bool {
    // ---
    presented > stored || (stored == 0 && presented == 0)
}

fn validate_friendly_name(name: &str) -> AuthResult<String> {
    // ---
    let len = name.chars().count();
    if len == 0 || len > MAX_FRIENDLY_NAME_LEN {
        return Err(AuthError::InvalidRequest(format!(
            "friendly name must be 1 to {MAX_FRIENDLY_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}
