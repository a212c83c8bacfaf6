use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"rd-auth 🔐
Version: {version}

Available endpoints:
  - POST   /auth/webauthn/register/options    - Passkey creation options (signed in)
  - POST   /auth/webauthn/register/verify     - Store a new passkey (signed in)
  - POST   /auth/webauthn/login/options       - Passkey login options
  - POST   /auth/webauthn/login/verify        - Passkey login
  - GET    /auth/webauthn/credentials         - List your passkeys
  - PATCH  /auth/webauthn/credentials/{{id}}    - Rename a passkey
  - DELETE /auth/webauthn/credentials/{{id}}    - Remove a passkey
  - GET    /auth/github/login                 - Sign in with GitHub
  - GET    /auth/github/callback              - GitHub OAuth callback
  - POST   /auth/logout                       - Clear the session cookie
  - GET    /auth/me                           - Current session claims
  - GET    /auth/status                       - Whether a session is present
  - POST   /auth/email/send-verification      - Mail an email verification link
  - POST   /auth/email/verify                 - Confirm an email address
  - POST   /auth/email/request-password-reset - Mail a password reset link
  - GET    /health                            - Light health check
  - GET    /health?mode=full                  - Full health check (includes challenge store)
  - GET    /metrics                           - Prometheus metrics
"#
    )
}
