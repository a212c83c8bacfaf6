//! WebAuthn authentication handlers.
//!
//! The login ceremony is anonymous, so its challenge is keyed by a random
//! ceremony id kept in a signed cookie between the two requests.

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::{CookieJar, SignedCookieJar};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::cookies::{ceremony_cookie, clear_ceremony_cookie, session_cookie, CEREMONY_COOKIE};
use super::shared_types::UserView;
use crate::app_state::AppState;
use crate::auth::ProfileClaims;
use crate::error::{AuthError, AuthResult};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOptionsRequest {
    // ---
    /// Restrict the ceremony to this user's credentials. Omit for a
    /// discoverable (usernameless) login.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct LoginVerifyResponse {
    // ---
    pub success: bool,
    pub user: UserView,
    pub token: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/webauthn/login/options
///
/// Starts a new ceremony. A ceremony still pending for this browser is
/// discarded first. The body is optional.
pub async fn login_options(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    body: Bytes,
) -> AuthResult<(SignedCookieJar, Json<Value>)> {
    // ---
    let req: LoginOptionsRequest = if body.is_empty() {
        LoginOptionsRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AuthError::InvalidRequest(format!("malformed body: {e}")))?
    };

    if let Some(previous) = jar.get(CEREMONY_COOKIE) {
        state
            .webauthn()
            .discard_authentication(previous.value())
            .await?;
    }

    let ceremony_id = Uuid::new_v4().simple().to_string();
    let options = state
        .webauthn()
        .generate_authentication_options(&ceremony_id, req.user_id)
        .await?;

    let jar = jar.add(ceremony_cookie(
        &ceremony_id,
        state.challenge_ttl(),
        state.http().secure_cookies,
    ));
    Ok((jar, Json(options)))
}

/// POST /auth/webauthn/login/verify
///
/// Body is the browser's `navigator.credentials.get()` result. On success the
/// session cookie is set and the token is also returned for bearer use.
pub async fn login_verify(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    cookies: CookieJar,
    Json(response): Json<Value>,
) -> Response {
    // ---
    let secure = state.http().secure_cookies;
    let ceremony_id = jar.get(CEREMONY_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(clear_ceremony_cookie(secure));

    match complete_login(&state, ceremony_id, &response).await {
        Ok((user, token)) => {
            let cookies = cookies.add(session_cookie(&token, state.tokens().ttl(), secure));
            let body = LoginVerifyResponse {
                success: true,
                user: UserView::from(&user),
                token,
            };
            (jar, cookies, Json(body)).into_response()
        }
        Err(err) => (jar, err).into_response(),
    }
}

async fn complete_login(
    state: &AppState,
    ceremony_id: Option<String>,
    response: &Value,
) -> AuthResult<(crate::domain::User, String)> {
    // ---
    let ceremony_id = ceremony_id.ok_or_else(|| {
        tracing::warn!("Login verification without a ceremony cookie");
        AuthError::ChallengeExpired
    })?;

    let user = state
        .webauthn()
        .verify_authentication(&ceremony_id, response)
        .await?;
    let token = state.tokens().issue(user.id, ProfileClaims::from(&user))?;

    tracing::info!("Passkey login for user {}", user.id);
    Ok((user, token))
}
