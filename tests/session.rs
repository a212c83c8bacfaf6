//! Session introspection, logout and token rejection.

use axum::http::{Method, StatusCode};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rd_auth::auth::{ProfileClaims, SessionClaims, TokenService};
use std::time::Duration;

mod common;
use common::{TestApp, SECRET};

#[tokio::test]
async fn status_reports_anonymous_and_authenticated() {
    // ---
    let app = TestApp::new();
    let anonymous = app.request(Method::GET, "/auth/status", None, &[]).await;
    assert_eq!(anonymous.body["authenticated"], false);

    let user = app.create_user("elrond").await;
    let token = app.token_for(&user);
    let signed_in = app
        .request(
            Method::GET,
            "/auth/status",
            None,
            &[(rd_auth::SESSION_COOKIE, &token)],
        )
        .await;
    assert_eq!(signed_in.body["authenticated"], true);
}

#[tokio::test]
async fn me_returns_the_token_claims() {
    // ---
    let app = TestApp::new();
    let user = app.create_user("galadriel").await;
    let token = app.token_for(&user);

    let me = app
        .request(Method::GET, "/auth/me", None, &[(rd_auth::SESSION_COOKIE, &token)])
        .await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["sub"], user.id.to_string());
    assert_eq!(me.body["username"], "galadriel");
    assert_eq!(me.body["email"], "galadriel@example.com");
    assert!(me.body["exp"].as_i64().unwrap() > me.body["iat"].as_i64().unwrap());
}

#[tokio::test]
async fn me_without_session_is_unauthorized() {
    // ---
    let app = TestApp::new();
    let me = app.request(Method::GET, "/auth/me", None, &[]).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    assert_eq!(me.body["message"], "Unauthorized");
}

#[tokio::test]
async fn expired_and_foreign_tokens_are_unauthorized() {
    // ---
    let app = TestApp::new();
    let user = app.create_user("celeborn").await;

    let issued = Utc::now().timestamp() - 7200;
    let stale = SessionClaims {
        sub: user.id.to_string(),
        profile: ProfileClaims::from(&user),
        iat: issued,
        exp: issued + 3600,
    };
    let expired = encode(
        &Header::default(),
        &stale,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    let foreign = TokenService::from_secret(b"some-other-secret-some-other-secret", Duration::from_secs(60))
        .issue(user.id, ProfileClaims::from(&user))
        .unwrap();

    for token in [expired, foreign, "garbage".to_string()] {
        let me = app
            .request(Method::GET, "/auth/me", None, &[(rd_auth::SESSION_COOKIE, &token)])
            .await;
        assert_eq!(me.status, StatusCode::UNAUTHORIZED);
        assert_eq!(me.body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    // ---
    let app = TestApp::new();
    let response = app.request(Method::POST, "/auth/logout", None, &[]).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.set_cookies()[rd_auth::SESSION_COOKIE], "");

    let set_cookie = response.headers["set-cookie"].to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=0"));
    assert!(set_cookie.contains("Path=/"));
}
