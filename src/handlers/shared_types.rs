//! JSON shapes shared by several handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Credential, User};

/// Plain `{ "success": true }` acknowledgement.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Public view of a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    // ---
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        // ---
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            avatar_url: user.avatar_url.clone(),
            email_verified: user.email_verified.is_some(),
        }
    }
}

/// Credential as listed to its owner. Verification material stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialView {
    // ---
    pub id: Uuid,
    pub credential_id: String,
    pub friendly_name: String,
    pub device_type: String,
    pub backed_up: bool,
    pub transports: Option<Vec<String>>,
    pub counter: i64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<Credential> for CredentialView {
    fn from(c: Credential) -> Self {
        // ---
        Self {
            id: c.id,
            credential_id: c.credential_id,
            friendly_name: c.friendly_name,
            device_type: c.device_type,
            backed_up: c.backed_up,
            transports: c.transports,
            counter: c.counter,
            created_at: c.created_at,
            last_used_at: c.last_used_at,
        }
    }
}
