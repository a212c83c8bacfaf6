//! Email verification and password-reset token endpoints.

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use super::shared_types::SuccessResponse;
use crate::app_state::AppState;
use crate::auth_context::AuthContext;
use crate::error::AuthResult;

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub user_id: Uuid,
    pub token: String,
}

/// POST /auth/email/send-verification
///
/// Mails a verification link to the requested address. The address is set
/// on the account once the link is followed.
pub async fn send_verification(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<EmailRequest>,
) -> AuthResult<Json<SuccessResponse>> {
    // ---
    let user_id = auth.require_user_id()?;
    state
        .verification()
        .send_email_verification(user_id, req.email.trim())
        .await?;

    Ok(Json(SuccessResponse::ok()))
}

/// POST /auth/email/verify
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> AuthResult<Json<SuccessResponse>> {
    // ---
    state
        .verification()
        .verify_email(req.user_id, &req.token)
        .await?;

    Ok(Json(SuccessResponse::ok()))
}

/// POST /auth/email/request-password-reset
///
/// Answers success whether or not the address is known.
pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<Json<SuccessResponse>> {
    // ---
    state
        .verification()
        .request_password_reset(req.email.trim())
        .await?;

    Ok(Json(SuccessResponse::ok()))
}
