//! Session introspection and logout.

use axum::{extract::State, Json};
use axum_extra::extract::CookieJar;
use serde::Serialize;

use super::cookies::clear_session_cookie;
use super::shared_types::SuccessResponse;
use crate::app_state::AppState;
use crate::auth::SessionClaims;
use crate::auth_context::AuthContext;
use crate::error::AuthResult;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub authenticated: bool,
}

/// POST /auth/logout
///
/// Tokens are stateless, so this only clears the cookie; a copied token stays
/// valid until it expires.
pub async fn logout(
    State(state): State<AppState>,
    cookies: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    // ---
    let cookies = cookies.add(clear_session_cookie(state.http().secure_cookies));
    (cookies, Json(SuccessResponse::ok()))
}

/// GET /auth/me
pub async fn me(auth: AuthContext) -> AuthResult<Json<SessionClaims>> {
    // ---
    Ok(Json(auth.require()?))
}

/// GET /auth/status
pub async fn status(auth: AuthContext) -> Json<StatusResponse> {
    // ---
    Json(StatusResponse {
        authenticated: auth.is_authenticated(),
    })
}
