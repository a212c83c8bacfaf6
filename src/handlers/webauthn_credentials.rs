//! Passkey management for the signed-in user.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::shared_types::{CredentialView, SuccessResponse};
use crate::app_state::AppState;
use crate::auth_context::AuthContext;
use crate::error::AuthResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameCredentialRequest {
    pub friendly_name: String,
}

/// GET /auth/webauthn/credentials
pub async fn list_credentials(
    State(state): State<AppState>,
    auth: AuthContext,
) -> AuthResult<Json<Vec<CredentialView>>> {
    // ---
    let user_id = auth.require_user_id()?;
    let credentials = state.webauthn().list_credentials(user_id).await?;

    Ok(Json(credentials.into_iter().map(Into::into).collect()))
}

/// DELETE /auth/webauthn/credentials/{id}
///
/// 403 when the credential belongs to someone else.
pub async fn delete_credential(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> AuthResult<Json<SuccessResponse>> {
    // ---
    let user_id = auth.require_user_id()?;
    state.webauthn().delete_credential(user_id, id).await?;

    Ok(Json(SuccessResponse::ok()))
}

/// PATCH /auth/webauthn/credentials/{id}
///
/// # Request Body
/// ```json
/// { "friendlyName": "Work laptop" }
/// ```
pub async fn rename_credential(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameCredentialRequest>,
) -> AuthResult<Json<SuccessResponse>> {
    // ---
    let user_id = auth.require_user_id()?;
    state
        .webauthn()
        .rename_credential(user_id, id, &req.friendly_name)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}
