//! GitHub OAuth handlers.
//!
//! Both endpoints answer with a 302. The `state` lives in a signed, short
//! lived cookie between the two requests and is cleared on every callback.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::{CookieJar, SignedCookieJar};
use serde::Deserialize;

use super::cookies::{clear_state_cookie, session_cookie, state_cookie, STATE_COOKIE};
use crate::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    // ---
    pub code: Option<String>,
    pub state: Option<String>,
}

/// 302 Found to `location`.
fn found(location: &str) -> Response {
    // ---
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /auth/github/login
pub async fn github_login(State(state): State<AppState>, jar: SignedCookieJar) -> Response {
    // ---
    let redirect = state.oauth().initiate_login();
    let jar = jar.add(state_cookie(&redirect.state, state.http().secure_cookies));

    tracing::info!("Redirecting to GitHub for authorization");
    (jar, found(redirect.authorization_url.as_str())).into_response()
}

/// GET /auth/github/callback?code&state
///
/// Success lands on `{frontend}/auth/callback` with the session cookie set;
/// failure lands there with `?error=<code>`.
pub async fn github_callback(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    cookies: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    // ---
    let secure = state.http().secure_cookies;
    let stored_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.add(clear_state_cookie(secure));
    let landing = format!("{}/auth/callback", state.http().frontend_url);

    let result = state
        .oauth()
        .handle_callback(
            query.code.as_deref(),
            stored_state.as_deref(),
            query.state.as_deref(),
        )
        .await;

    match result {
        Ok(login) => {
            let cookies = cookies.add(session_cookie(&login.token, state.tokens().ttl(), secure));
            (jar, cookies, found(&landing)).into_response()
        }
        Err(err) => {
            let location = format!("{landing}?error={}", err.code());
            (jar, found(&location)).into_response()
        }
    }
}
