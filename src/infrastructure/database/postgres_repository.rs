use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{
    Credential, LinkedIdentity, NewIdentityOutcome, Repository, RepositoryPtr, TokenKind, User,
    VerificationToken,
};

const USER_COLUMNS: &str =
    "id, username, email, name, avatar_url, email_verified, created_at, updated_at";

const CREDENTIAL_COLUMNS: &str = "id, user_id, credential_id, public_key, counter, device_type, \
     backed_up, transports, friendly_name, created_at, updated_at, last_used_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
    email_verified: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        // ---
        User {
            id: r.id,
            username: r.username,
            email: r.email,
            name: r.name,
            avatar_url: r.avatar_url,
            email_verified: r.email_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct KeyRow {
    id: String,
    user_id: Uuid,
    provider: String,
    provider_user_id: String,
    hashed_password: Option<String>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    user_id: Uuid,
    credential_id: String,
    public_key: String,
    counter: i64,
    device_type: String,
    backed_up: bool,
    transports: Option<Vec<String>>,
    friendly_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<CredentialRow> for Credential {
    fn from(r: CredentialRow) -> Self {
        // ---
        Credential {
            id: r.id,
            user_id: r.user_id,
            credential_id: r.credential_id,
            public_key: r.public_key,
            counter: r.counter,
            device_type: r.device_type,
            backed_up: r.backed_up,
            transports: r.transports,
            friendly_name: r.friendly_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
            last_used_at: r.last_used_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    kind: String,
    email: Option<String>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for VerificationToken {
    type Error = anyhow::Error;

    fn try_from(r: TokenRow) -> Result<Self> {
        // ---
        let kind = TokenKind::parse(&r.kind)
            .ok_or_else(|| anyhow!("unknown verification token kind '{}'", r.kind))?;
        Ok(VerificationToken {
            id: r.id,
            user_id: r.user_id,
            token_hash: r.token_hash,
            kind,
            email: r.email,
            expires_at: r.expires_at,
            created_at: r.created_at,
        })
    }
}

/// Map a unique-constraint violation to the insertion outcome it stands for.
fn conflict_outcome(err: &sqlx::Error) -> Option<NewIdentityOutcome> {
    // ---
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }

    match db_err.constraint() {
        Some("users_username_key") => Some(NewIdentityOutcome::UsernameTaken),
        Some("users_email_key") => Some(NewIdentityOutcome::EmailTaken),
        Some("keys_pkey") => Some(NewIdentityOutcome::IdentityExists),
        _ => None,
    }
}

pub fn create_postgres_repository(pool: PgPool) -> RepositoryPtr {
    // ---
    Arc::new(PostgresRepository::new(pool))
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    // ---
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn find_linked_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<LinkedIdentity>> {
        // ---
        let row = sqlx::query_as::<_, KeyRow>(
            "SELECT id, user_id, provider, provider_user_id, hashed_password
             FROM keys WHERE id = $1",
        )
        .bind(LinkedIdentity::key(provider, provider_user_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LinkedIdentity {
            id: r.id,
            user_id: r.user_id,
            provider: r.provider,
            provider_user_id: r.provider_user_id,
            hashed_password: r.hashed_password,
        }))
    }

    async fn insert_user_and_linked_identity(
        &self,
        user: User,
        identity: LinkedIdentity,
    ) -> Result<NewIdentityOutcome> {
        // ---
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO users (id, username, email, name, avatar_url, email_verified, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.avatar_url)
        .bind(user.email_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            tx.rollback().await?;
            return conflict_outcome(&e).ok_or_else(|| e.into());
        }

        let linked = sqlx::query(
            "INSERT INTO keys (id, user_id, provider, provider_user_id, hashed_password)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&identity.id)
        .bind(identity.user_id)
        .bind(&identity.provider)
        .bind(&identity.provider_user_id)
        .bind(&identity.hashed_password)
        .execute(&mut *tx)
        .await;

        if let Err(e) = linked {
            tx.rollback().await?;
            return conflict_outcome(&e).ok_or_else(|| e.into());
        }

        tx.commit().await?;
        Ok(NewIdentityOutcome::Created(user))
    }

    async fn link_identity(&self, identity: LinkedIdentity) -> Result<bool> {
        // ---
        let result = sqlx::query(
            "INSERT INTO keys (id, user_id, provider, provider_user_id, hashed_password)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&identity.id)
        .bind(identity.user_id)
        .bind(&identity.provider)
        .bind(&identity.provider_user_id)
        .bind(&identity.hashed_password)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_verified_email(
        &self,
        user_id: Uuid,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        // ---
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE users SET email = NULL, updated_at = $3
             WHERE email = $2 AND id <> $1 AND email_verified IS NULL",
        )
        .bind(user_id)
        .bind(email)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query(
            "UPDATE users SET email = $2, email_verified = $3, updated_at = $3 WHERE id = $1",
        )
        .bind(user_id)
        .bind(email)
        .bind(at)
        .execute(&mut *tx)
        .await;

        match updated {
            Ok(result) if result.rows_affected() == 0 => {
                tx.rollback().await?;
                Err(anyhow!("unknown user {user_id}"))
            }
            Ok(_) => {
                tx.commit().await?;
                Ok(true)
            }
            Err(e) if conflict_outcome(&e) == Some(NewIdentityOutcome::EmailTaken) => {
                tx.rollback().await?;
                Ok(false)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e.into())
            }
        }
    }

    async fn release_unverified_email(&self, email: &str) -> Result<bool> {
        // ---
        let result = sqlx::query(
            "UPDATE users SET email = NULL, updated_at = now()
             WHERE email = $1 AND email_verified IS NULL",
        )
        .bind(email)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_credential(&self, credential: Credential) -> Result<bool> {
        // ---
        let result = sqlx::query(
            "INSERT INTO webauthn_credentials
                (id, user_id, credential_id, public_key, counter, device_type, backed_up,
                 transports, friendly_name, created_at, updated_at, last_used_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (credential_id) DO NOTHING",
        )
        .bind(credential.id)
        .bind(credential.user_id)
        .bind(&credential.credential_id)
        .bind(&credential.public_key)
        .bind(credential.counter)
        .bind(&credential.device_type)
        .bind(credential.backed_up)
        .bind(&credential.transports)
        .bind(&credential.friendly_name)
        .bind(credential.created_at)
        .bind(credential.updated_at)
        .bind(credential.last_used_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_credentials_by_user(&self, user_id: Uuid) -> Result<Vec<Credential>> {
        // ---
        let rows = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM webauthn_credentials
             WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Credential::from).collect())
    }

    async fn find_credential_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Credential>> {
        // ---
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM webauthn_credentials WHERE credential_id = $1"
        ))
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Credential::from))
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>> {
        // ---
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM webauthn_credentials WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Credential::from))
    }

    async fn update_credential_counter(
        &self,
        credential_id: &str,
        expected_counter: i64,
        new_counter: i64,
        public_key: &str,
        backed_up: bool,
    ) -> Result<bool> {
        // ---
        let result = sqlx::query(
            "UPDATE webauthn_credentials
             SET counter = $3, public_key = $4, backed_up = $5,
                 last_used_at = now(), updated_at = now()
             WHERE credential_id = $1 AND counter = $2",
        )
        .bind(credential_id)
        .bind(expected_counter)
        .bind(new_counter)
        .bind(public_key)
        .bind(backed_up)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn rename_credential(
        &self,
        id: Uuid,
        user_id: Uuid,
        friendly_name: &str,
    ) -> Result<bool> {
        // ---
        let result = sqlx::query(
            "UPDATE webauthn_credentials SET friendly_name = $3, updated_at = now()
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(friendly_name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_credential(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        // ---
        let result = sqlx::query("DELETE FROM webauthn_credentials WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_verification_token(&self, token: VerificationToken) -> Result<()> {
        // ---
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM verification_tokens WHERE user_id = $1 AND kind = $2")
            .bind(token.user_id)
            .bind(token.kind.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO verification_tokens (id, user_id, token_hash, kind, email, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token_hash)
        .bind(token.kind.as_str())
        .bind(&token.email)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn take_verification_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>> {
        // ---
        let row = sqlx::query_as::<_, TokenRow>(
            "DELETE FROM verification_tokens
             WHERE user_id = $1 AND kind = $2 AND token_hash = $3
             RETURNING id, user_id, token_hash, kind, email, expires_at, created_at",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VerificationToken::try_from).transpose()
    }
}
