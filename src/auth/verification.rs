//! Out-of-band verification tokens (email verification, password reset).
//!
//! Plaintext tokens only ever exist in the outgoing message; the store holds
//! their SHA-256. Issuing a token replaces older tokens of the same kind for
//! that user, and a token is deleted by the first attempt that finds it.

use anyhow::Result;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::domain::{RepositoryPtr, TokenKind, VerificationToken};
use crate::error::{AuthError, AuthResult};

/// Lifetime of an issued token.
pub const TOKEN_TTL_HOURS: i64 = 24;

/// A message for the mail transport.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    // ---
    pub to: String,
    pub kind: TokenKind,
    pub link: Url,
}

/// Mail delivery seam. Real transport lives outside this service.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

pub type MailerPtr = Arc<dyn Mailer>;

/// Records dispatch without delivering anything.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        // ---
        tracing::debug!("Mail ({}) queued for {}", mail.kind.as_str(), mail.to);
        Ok(())
    }
}

pub fn create_log_mailer() -> MailerPtr {
    // ---
    Arc::new(LogMailer)
}

fn hash_token(token: &str) -> String {
    // ---
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn new_plaintext_token() -> String {
    // ---
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct VerificationService {
    // ---
    repository: RepositoryPtr,
    mailer: MailerPtr,
    frontend_url: String,
}

impl VerificationService {
    // ---
    pub fn new(repository: RepositoryPtr, mailer: MailerPtr, frontend_url: &str) -> Self {
        // ---
        Self {
            repository,
            mailer,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Mail a verification link for `email` to that address.
    ///
    /// The address stays on the token until the link is followed; the user
    /// record only ever carries confirmed addresses. An address another
    /// account already confirmed gets the same answer but no mail.
    pub async fn send_email_verification(&self, user_id: Uuid, email: &str) -> AuthResult<()> {
        // ---
        let email = email.trim();
        if !looks_like_email(email) {
            return Err(AuthError::InvalidRequest("invalid email address".into()));
        }

        let user = self
            .repository
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if user.email.as_deref() == Some(email) && user.email_verified.is_some() {
            return Err(AuthError::InvalidRequest("email already verified".into()));
        }

        if let Some(owner) = self.repository.find_user_by_email(email).await? {
            if owner.id != user_id && owner.email_verified.is_some() {
                tracing::warn!("User {} requested verification of an email in use", user_id);
                return Ok(());
            }
        }

        let token = self.issue(user_id, TokenKind::Email, Some(email)).await?;
        let link = self.link("verify-email", user_id, &token)?;
        self.mailer
            .send(OutgoingMail {
                to: email.to_string(),
                kind: TokenKind::Email,
                link,
            })
            .await
            .map_err(|e| AuthError::Internal(format!("mail dispatch: {e:#}")))?;

        tracing::info!("Email verification sent for user {}", user_id);
        Ok(())
    }

    /// Consume an email token and set its address on the user, verified.
    pub async fn verify_email(&self, user_id: Uuid, token: &str) -> AuthResult<()> {
        // ---
        let stored = self.consume(user_id, TokenKind::Email, token).await?;
        let email = stored.email.ok_or_else(|| {
            tracing::warn!("Email token for user {} carries no address", user_id);
            AuthError::TokenNotFound
        })?;

        if !self
            .repository
            .set_verified_email(user_id, &email, Utc::now())
            .await?
        {
            tracing::warn!("User {} confirmed an address verified elsewhere meanwhile", user_id);
            return Err(AuthError::InvalidRequest("email address unavailable".into()));
        }

        tracing::info!("Email verified for user {}", user_id);
        Ok(())
    }

    /// Mail a reset link if `email` belongs to someone.
    ///
    /// Always succeeds from the caller's point of view, so the endpoint cannot
    /// reveal which addresses have accounts.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        // ---
        match self.password_reset(email.trim()).await {
            Ok(()) => {}
            Err(e) => tracing::warn!("Password reset request not fulfilled: {}", e),
        }
        Ok(())
    }

    async fn password_reset(&self, email: &str) -> AuthResult<()> {
        // ---
        let Some(user) = self
            .repository
            .find_user_by_email(email)
            .await?
            .filter(|u| u.email_verified.is_some())
        else {
            tracing::debug!("Password reset requested for an unknown or unverified address");
            return Ok(());
        };

        let token = self.issue(user.id, TokenKind::PasswordReset, None).await?;
        let link = self.link("reset-password", user.id, &token)?;
        self.mailer
            .send(OutgoingMail {
                to: email.to_string(),
                kind: TokenKind::PasswordReset,
                link,
            })
            .await
            .map_err(|e| AuthError::Internal(format!("mail dispatch: {e:#}")))?;

        tracing::info!("Password reset sent for user {}", user.id);
        Ok(())
    }

    async fn issue(&self, user_id: Uuid, kind: TokenKind, email: Option<&str>) -> AuthResult<String> {
        // ---
        let token = new_plaintext_token();
        let mut record = VerificationToken::new(
            user_id,
            kind,
            hash_token(&token),
            chrono::Duration::hours(TOKEN_TTL_HOURS),
        );
        if let Some(email) = email {
            record = record.with_email(email);
        }
        self.repository.replace_verification_token(record).await?;
        Ok(token)
    }

    /// Delete the matching token and return it, failing unless it was live.
    pub async fn consume(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        token: &str,
    ) -> AuthResult<VerificationToken> {
        // ---
        let stored = self
            .repository
            .take_verification_token(user_id, kind, &hash_token(token))
            .await?
            .ok_or_else(|| {
                tracing::warn!("No {} token matched for user {}", kind.as_str(), user_id);
                AuthError::TokenNotFound
            })?;

        if stored.is_expired(Utc::now()) {
            tracing::warn!("Expired {} token used for user {}", kind.as_str(), user_id);
            return Err(AuthError::TokenNotFound);
        }

        Ok(stored)
    }

    fn link(&self, path: &str, user_id: Uuid, token: &str) -> AuthResult<Url> {
        // ---
        let base = format!("{}/{path}", self.frontend_url);
        Url::parse_with_params(&base, &[("token", token), ("userId", &user_id.to_string())])
            .map_err(|e| AuthError::Internal(format!("build link: {e}")))
    }
}

fn looks_like_email(email: &str) -> bool {
    // ---
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !email.contains(' ')
        }
        None => false,
    }
}
