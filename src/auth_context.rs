//! Who is calling: the request's verified session, or nobody.
//!
//! Handlers take [`AuthContext`] as an extractor. It never rejects a request;
//! routes that need a user call [`AuthContext::require`].

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use std::convert::Infallible;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::SessionClaims;
use crate::error::{AuthError, AuthResult};
use crate::handlers::SESSION_COOKIE;

#[derive(Debug, Clone, PartialEq)]
pub enum AuthContext {
    Authenticated(SessionClaims),
    Anonymous,
}

impl AuthContext {
    // ---
    /// Claims of the authenticated caller, or `Unauthorized`.
    pub fn require(self) -> AuthResult<SessionClaims> {
        // ---
        match self {
            AuthContext::Authenticated(claims) => Ok(claims),
            AuthContext::Anonymous => Err(AuthError::Unauthorized),
        }
    }

    /// Id of the authenticated caller, or `Unauthorized`.
    pub fn require_user_id(self) -> AuthResult<Uuid> {
        // ---
        self.require()?.user_id()
    }

    pub fn is_authenticated(&self) -> bool {
        // ---
        matches!(self, AuthContext::Authenticated(_))
    }
}

/// Session token from the cookie, else from `Authorization: Bearer`.
fn presented_token(parts: &Parts) -> Option<String> {
    // ---
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // ---
        let Some(token) = presented_token(parts) else {
            return Ok(AuthContext::Anonymous);
        };

        // The token service logs why a token was refused.
        Ok(match state.tokens().verify(&token) {
            Ok(claims) => AuthContext::Authenticated(claims),
            Err(_) => AuthContext::Anonymous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<(&str, &str)>) -> Parts {
        // ---
        let mut builder = Request::builder().uri("/auth/me");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn cookie_token_is_found() {
        // ---
        let parts = parts(Some(("cookie", "other=1; rd_auth_token=abc.def.ghi")));
        assert_eq!(presented_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn bearer_token_is_found() {
        // ---
        let parts = parts(Some(("authorization", "Bearer abc.def.ghi")));
        assert_eq!(presented_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn other_schemes_and_empty_values_are_ignored() {
        // ---
        assert_eq!(presented_token(&parts(Some(("authorization", "Basic Zm9v")))), None);
        assert_eq!(presented_token(&parts(Some(("authorization", "Bearer ")))), None);
        assert_eq!(presented_token(&parts(Some(("cookie", "rd_auth_token=")))), None);
        assert_eq!(presented_token(&parts(None)), None);
    }

    #[test]
    fn anonymous_context_is_unauthorized() {
        // ---
        assert!(matches!(
            AuthContext::Anonymous.require(),
            Err(AuthError::Unauthorized)
        ));
        assert!(!AuthContext::Anonymous.is_authenticated());
    }
}
