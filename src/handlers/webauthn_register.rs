//! WebAuthn registration handlers.
//!
//! Two-phase passkey registration for a signed-in user:
//! 1. `register_options` - issue creation options, park the challenge
//! 2. `register_verify` - verify the attestation and store the credential

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::shared_types::CredentialView;
use crate::app_state::AppState;
use crate::auth_context::AuthContext;
use crate::error::{AuthError, AuthResult};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationVerifyRequest {
    // ---
    /// The browser's `navigator.credentials.create()` result, JSON encoded.
    pub response: Value,
    pub friendly_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegistrationVerifyResponse {
    // ---
    pub success: bool,
    pub credential: CredentialView,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/webauthn/register/options
///
/// Returns `PublicKeyCredentialCreationOptions` for the caller. The
/// challenge is stored server-side and expires with the configured TTL.
pub async fn register_options(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AuthResult<Json<Value>> {
    // ---
    let user_id = auth.require_user_id()?;
    let user = state
        .repository()
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("Session for unknown user {}", user_id);
            AuthError::Unauthorized
        })?;

    let options = state.webauthn().generate_registration_options(&user).await?;
    Ok(Json(options))
}

/// POST /auth/webauthn/register/verify
///
/// # Request Body
/// ```json
/// { "response": { ...attestation... }, "friendlyName": "Laptop" }
/// ```
pub async fn register_verify(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<RegistrationVerifyRequest>,
) -> AuthResult<Json<RegistrationVerifyResponse>> {
    // ---
    let user_id = auth.require_user_id()?;

    let credential = state
        .webauthn()
        .verify_registration(user_id, &req.response, req.friendly_name.as_deref())
        .await?;

    Ok(Json(RegistrationVerifyResponse {
        success: true,
        credential: credential.into(),
    }))
}
