//! Email verification and password-reset tokens through the HTTP surface.

use axum::http::{Method, StatusCode};
use chrono::Utc;
use rd_auth::domain::TokenKind;
use serde_json::json;
use std::collections::HashMap;

mod common;
use common::{TestApp, FRONTEND};

fn link_params(app: &TestApp, index: usize) -> HashMap<String, String> {
    // ---
    let sent = app.mailer.sent.lock().unwrap();
    sent[index].link.query_pairs().into_owned().collect()
}

#[tokio::test]
async fn verification_link_confirms_the_address() {
    // ---
    let app = TestApp::new();
    let user = app.create_user("eowyn").await;
    let session = app.token_for(&user);

    let sent = app
        .request(
            Method::POST,
            "/auth/email/send-verification",
            Some(json!({ "email": "eowyn@rohan.example" })),
            &[(rd_auth::SESSION_COOKIE, &session)],
        )
        .await;
    assert_eq!(sent.status, StatusCode::OK);

    {
        let mail = &app.mailer.sent.lock().unwrap()[0];
        assert_eq!(mail.to, "eowyn@rohan.example");
        assert_eq!(mail.kind, TokenKind::Email);
        assert!(mail.link.as_str().starts_with(&format!("{FRONTEND}/verify-email?")));
    }
    let params = link_params(&app, 0);
    assert_eq!(params["userId"], user.id.to_string());

    let body = json!({ "userId": user.id, "token": params["token"] });
    let verified = app
        .request(Method::POST, "/auth/email/verify", Some(body.clone()), &[])
        .await;
    assert_eq!(verified.status, StatusCode::OK);

    let stored = app.repo.get_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.email.as_deref(), Some("eowyn@rohan.example"));
    assert!(stored.email_verified.is_some());

    let again = app
        .request(Method::POST, "/auth/email/verify", Some(body), &[])
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["error"], "invalid_token");
}

#[tokio::test]
async fn sending_verification_requires_a_session() {
    // ---
    let app = TestApp::new();
    let response = app
        .request(
            Method::POST,
            "/auth/email/send-verification",
            Some(json!({ "email": "anon@example.com" })),
            &[],
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(app.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    // ---
    let app = TestApp::new();
    let user = app.create_user("faramir").await;
    let session = app.token_for(&user);
    app.request(
        Method::POST,
        "/auth/email/send-verification",
        Some(json!({ "email": "faramir@gondor.example" })),
        &[(rd_auth::SESSION_COOKIE, &session)],
    )
    .await;

    let response = app
        .request(
            Method::POST,
            "/auth/email/verify",
            Some(json!({ "userId": user.id, "token": "00".repeat(32) })),
            &[],
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn password_reset_answers_the_same_for_unknown_addresses() {
    // ---
    let app = TestApp::new();
    let denethor = app.create_user("denethor").await;
    app.repo
        .set_verified_email(denethor.id, "denethor@example.com", Utc::now())
        .await
        .unwrap();

    let known = app
        .request(
            Method::POST,
            "/auth/email/request-password-reset",
            Some(json!({ "email": "denethor@example.com" })),
            &[],
        )
        .await;
    let unknown = app
        .request(
            Method::POST,
            "/auth/email/request-password-reset",
            Some(json!({ "email": "nobody@example.com" })),
            &[],
        )
        .await;

    assert_eq!(known.status, StatusCode::OK);
    assert_eq!(unknown.status, StatusCode::OK);
    assert_eq!(known.body, unknown.body);

    let sent = app.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, TokenKind::PasswordReset);
    assert!(sent[0].link.path().ends_with("/reset-password"));
}

#[tokio::test]
async fn claiming_a_confirmed_address_looks_like_success() {
    // ---
    let app = TestApp::new();
    let owner = app.create_user("imrahil").await;
    app.repo
        .set_verified_email(owner.id, "prince@dol-amroth.example", Utc::now())
        .await
        .unwrap();
    let other = app.create_user("beregond").await;
    let session = app.token_for(&other);

    let response = app
        .request(
            Method::POST,
            "/auth/email/send-verification",
            Some(json!({ "email": "prince@dol-amroth.example" })),
            &[(rd_auth::SESSION_COOKIE, &session)],
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert!(app.mailer.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn pending_address_is_not_on_the_account_until_confirmed() {
    // ---
    let app = TestApp::new();
    let user = app.create_user("ioreth").await;
    let session = app.token_for(&user);

    app.request(
        Method::POST,
        "/auth/email/send-verification",
        Some(json!({ "email": "ioreth@houses-of-healing.example" })),
        &[(rd_auth::SESSION_COOKIE, &session)],
    )
    .await;

    assert!(app
        .repo
        .find_user_by_email("ioreth@houses-of-healing.example")
        .await
        .unwrap()
        .is_none());
    let stored = app.repo.get_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(stored.email.as_deref(), Some("ioreth@example.com"));
}
