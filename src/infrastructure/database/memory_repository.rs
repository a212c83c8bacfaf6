//! In-process Credential Store for development and tests.
//!
//! A single mutex guards all tables, so every trait method is atomic with
//! respect to every other, mirroring the unique constraints of the PostgreSQL
//! schema.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    Credential, LinkedIdentity, NewIdentityOutcome, Repository, RepositoryPtr, TokenKind, User,
    VerificationToken,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    keys: HashMap<String, LinkedIdentity>,
    credentials: HashMap<Uuid, Credential>,
    tokens: HashMap<Uuid, VerificationToken>,
}

impl Tables {
    // ---
    fn username_taken(&self, username: &str) -> bool {
        // ---
        self.users.values().any(|u| u.username == username)
    }

    fn email_taken(&self, email: &str) -> bool {
        // ---
        self.users
            .values()
            .any(|u| u.email.as_deref() == Some(email))
    }
}

pub fn create_memory_repository() -> RepositoryPtr {
    // ---
    Arc::new(MemoryRepository::default())
}

#[derive(Default)]
pub struct MemoryRepository {
    // ---
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    // ---
    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        // ---
        self.tables
            .lock()
            .map_err(|_| anyhow!("memory repository lock poisoned"))
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    // ---
    async fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        // ---
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        // ---
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_linked_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<LinkedIdentity>> {
        // ---
        let key = LinkedIdentity::key(provider, provider_user_id);
        Ok(self.lock()?.keys.get(&key).cloned())
    }

    async fn insert_user_and_linked_identity(
        &self,
        user: User,
        identity: LinkedIdentity,
    ) -> Result<NewIdentityOutcome> {
        // ---
        let mut tables = self.lock()?;

        if tables.keys.contains_key(&identity.id) {
            return Ok(NewIdentityOutcome::IdentityExists);
        }
        if tables.username_taken(&user.username) {
            return Ok(NewIdentityOutcome::UsernameTaken);
        }
        if let Some(email) = user.email.as_deref() {
            if tables.email_taken(email) {
                return Ok(NewIdentityOutcome::EmailTaken);
            }
        }

        tables.keys.insert(identity.id.clone(), identity);
        tables.users.insert(user.id, user.clone());

        Ok(NewIdentityOutcome::Created(user))
    }

    async fn link_identity(&self, identity: LinkedIdentity) -> Result<bool> {
        // ---
        let mut tables = self.lock()?;

        if !tables.users.contains_key(&identity.user_id) {
            return Err(anyhow!("cannot link identity to unknown user {}", identity.user_id));
        }
        if tables.keys.contains_key(&identity.id) {
            return Ok(false);
        }

        tables.keys.insert(identity.id.clone(), identity);
        Ok(true)
    }

    async fn set_verified_email(
        &self,
        user_id: Uuid,
        email: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        // ---
        let mut tables = self.lock()?;

        if !tables.users.contains_key(&user_id) {
            return Err(anyhow!("unknown user {user_id}"));
        }

        for other in tables.users.values_mut() {
            if other.id == user_id || other.email.as_deref() != Some(email) {
                continue;
            }
            if other.email_verified.is_some() {
                return Ok(false);
            }
            other.email = None;
            other.updated_at = at;
        }

        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("unknown user {user_id}"))?;
        user.email = Some(email.to_string());
        user.email_verified = Some(at);
        user.updated_at = at;

        Ok(true)
    }

    async fn release_unverified_email(&self, email: &str) -> Result<bool> {
        // ---
        let mut tables = self.lock()?;
        let holder = tables
            .users
            .values_mut()
            .find(|u| u.email.as_deref() == Some(email) && u.email_verified.is_none());

        match holder {
            Some(user) => {
                user.email = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_credential(&self, credential: Credential) -> Result<bool> {
        // ---
        let mut tables = self.lock()?;

        let duplicate = tables
            .credentials
            .values()
            .any(|c| c.credential_id == credential.credential_id);
        if duplicate {
            return Ok(false);
        }

        tables.credentials.insert(credential.id, credential);
        Ok(true)
    }

    async fn get_credentials_by_user(&self, user_id: Uuid) -> Result<Vec<Credential>> {
        // ---
        let mut credentials: Vec<Credential> = self
            .lock()?
            .credentials
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        credentials.sort_by_key(|c| c.created_at);

        Ok(credentials)
    }

    async fn find_credential_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Credential>> {
        // ---
        Ok(self
            .lock()?
            .credentials
            .values()
            .find(|c| c.credential_id == credential_id)
            .cloned())
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>> {
        // ---
        Ok(self.lock()?.credentials.get(&id).cloned())
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
        let mut tables = self.lock()?;

        let Some(credential) = tables
            .credentials
            .values_mut()
            .find(|c| c.credential_id == credential_id)
        else {
            return Ok(false);
        };

        if credential.counter != expected_counter {
            return Ok(false);
        }

        let now = Utc::now();
        credential.counter = new_counter;
        credential.public_key = public_key.to_string();
        credential.backed_up = backed_up;
        credential.last_used_at = Some(now);
        credential.updated_at = now;

        Ok(true)
    }

    async fn rename_credential(
        &self,
        id: Uuid,
        user_id: Uuid,
        friendly_name: &str,
    ) -> Result<bool> {
        // ---
        let mut tables = self.lock()?;

        match tables.credentials.get_mut(&id) {
            Some(credential) if credential.user_id == user_id => {
                credential.friendly_name = friendly_name.to_string();
                credential.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_credential(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        // ---
        let mut tables = self.lock()?;

        match tables.credentials.get(&id) {
            Some(credential) if credential.user_id == user_id => {
                tables.credentials.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_verification_token(&self, token: VerificationToken) -> Result<()> {
        // ---
        let mut tables = self.lock()?;
        tables
            .tokens
            .retain(|_, t| !(t.user_id == token.user_id && t.kind == token.kind));
        tables.tokens.insert(token.id, token);

        Ok(())
    }

    async fn take_verification_token(
        &self,
        user_id: Uuid,
        kind: TokenKind,
        token_hash: &str,
    ) -> Result<Option<VerificationToken>> {
        // ---
        let mut tables = self.lock()?;

        let id = tables
            .tokens
            .values()
            .find(|t| t.user_id == user_id && t.kind == kind && t.token_hash == token_hash)
            .map(|t| t.id);

        Ok(id.and_then(|id| tables.tokens.remove(&id)))
    }
}
