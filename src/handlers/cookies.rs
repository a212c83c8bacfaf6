//! Cookie builders for the session, OAuth state and login ceremony.
//!
//! The session cookie carries the signed token itself. The state and ceremony
//! cookies go through a `SignedCookieJar`, so only values this service issued
//! are accepted back.

use axum_extra::extract::cookie::{Cookie, SameSite};
use std::time::Duration as StdDuration;
use time::Duration;

/// Cookie name for the session token.
pub const SESSION_COOKIE: &str = "rd_auth_token";
/// Cookie name for the pending OAuth `state`.
pub const STATE_COOKIE: &str = "rd_oauth_state";
/// Cookie name for the anonymous login ceremony id.
pub const CEREMONY_COOKIE: &str = "rd_webauthn_ceremony";

/// OAuth state lifetime.
pub const STATE_MAX_AGE_SECS: i64 = 600;

fn build(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    // ---
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

fn seconds(duration: StdDuration) -> Duration {
    // ---
    Duration::seconds(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
}

pub fn session_cookie(token: &str, ttl: StdDuration, secure: bool) -> Cookie<'static> {
    build(SESSION_COOKIE, token.to_string(), seconds(ttl), secure)
}

pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    build(SESSION_COOKIE, String::new(), Duration::ZERO, secure)
}

pub fn state_cookie(state: &str, secure: bool) -> Cookie<'static> {
    build(
        STATE_COOKIE,
        state.to_string(),
        Duration::seconds(STATE_MAX_AGE_SECS),
        secure,
    )
}

pub fn clear_state_cookie(secure: bool) -> Cookie<'static> {
    build(STATE_COOKIE, String::new(), Duration::ZERO, secure)
}

pub fn ceremony_cookie(ceremony_id: &str, ttl: StdDuration, secure: bool) -> Cookie<'static> {
    build(CEREMONY_COOKIE, ceremony_id.to_string(), seconds(ttl), secure)
}

pub fn clear_ceremony_cookie(secure: bool) -> Cookie<'static> {
    build(CEREMONY_COOKIE, String::new(), Duration::ZERO, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_matches_token_ttl() {
        // ---
        let cookie = session_cookie("tok", StdDuration::from_secs(604_800), true);

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(604_800)));
    }

    #[test]
    fn state_cookie_lives_ten_minutes() {
        // ---
        let cookie = state_cookie("abc", false);
        assert_eq!(cookie.max_age(), Some(Duration::seconds(600)));
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn clearing_expires_immediately() {
        // ---
        for cookie in [
            clear_session_cookie(false),
            clear_state_cookie(false),
            clear_ceremony_cookie(false),
        ] {
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        }
    }
}
