//! Error taxonomy of the authentication core.
//!
//! Every ceremony step converts its failures into an [`AuthError`] before the
//! route boundary. The HTTP mapping deliberately collapses the security
//! sensitive variants into generic messages; the precise reason is logged where
//! the error is raised.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Convenience alias for auth-core results.
pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    // ---
    /// OAuth `state` missing or mismatched.
    #[error("invalid OAuth state")]
    InvalidState,

    #[error("authorization code missing")]
    MissingCode,

    /// Network or API failure at the OAuth provider.
    #[error("upstream provider error: {0}")]
    UpstreamProvider(String),

    /// Attestation or assertion did not verify.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// No stored challenge for this ceremony (expired, consumed or never issued).
    #[error("ceremony challenge expired or missing")]
    ChallengeExpired,

    #[error("credential not found")]
    CredentialNotFound,

    /// Assertion counter did not advance past the stored value.
    #[error("signature counter replay (stored {stored}, presented {presented})")]
    CounterReplay { stored: i64, presented: i64 },

    #[error("token expired")]
    TokenExpired,

    #[error("token invalid: {0}")]
    TokenInvalid(String),

    /// Provider profile has no usable verified email.
    #[error("no verified email available")]
    EmailUnverified,

    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Verification token missing, expired or already used.
    #[error("verification token invalid or expired")]
    TokenNotFound,

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        // ---
        AuthError::Storage(format!("{err:#}"))
    }
}

impl AuthError {
    // ---
    /// Short machine-readable code, also used in redirect query strings.
    pub fn code(&self) -> &'static str {
        // ---
        match self {
            AuthError::InvalidState => "invalid_state",
            AuthError::MissingCode => "missing_code",
            AuthError::UpstreamProvider(_) => "upstream_provider_error",
            AuthError::VerificationFailed(_) => "verification_failed",
            AuthError::ChallengeExpired => "session_expired",
            AuthError::CredentialNotFound => "credential_not_found",
            AuthError::CounterReplay { .. } => "verification_failed",
            AuthError::TokenExpired | AuthError::TokenInvalid(_) => "unauthorized",
            AuthError::EmailUnverified => "email_unverified",
            AuthError::Unauthorized => "unauthorized",
            AuthError::Forbidden(_) => "forbidden",
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::TokenNotFound => "invalid_token",
            AuthError::Storage(_) | AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            AuthError::InvalidState
            | AuthError::MissingCode
            | AuthError::ChallengeExpired
            | AuthError::EmailUnverified
            | AuthError::InvalidRequest(_)
            | AuthError::TokenNotFound => StatusCode::BAD_REQUEST,
            AuthError::VerificationFailed(_)
            | AuthError::CredentialNotFound
            | AuthError::CounterReplay { .. }
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_)
            | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::UpstreamProvider(_) => StatusCode::BAD_GATEWAY,
            AuthError::Storage(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> &'static str {
        // ---
        match self {
            AuthError::InvalidState => "Invalid OAuth state",
            AuthError::MissingCode => "Authorization code missing",
            AuthError::UpstreamProvider(_) => "Sign-in provider unavailable, please retry",
            AuthError::VerificationFailed(_)
            | AuthError::CredentialNotFound
            | AuthError::CounterReplay { .. } => "Authentication failed",
            AuthError::ChallengeExpired => "Session expired, please retry",
            AuthError::TokenExpired | AuthError::TokenInvalid(_) | AuthError::Unauthorized => {
                "Unauthorized"
            }
            AuthError::EmailUnverified => {
                "Could not retrieve a verified primary email from the provider"
            }
            AuthError::Forbidden(_) => "Forbidden",
            AuthError::InvalidRequest(_) => "Invalid request",
            AuthError::TokenNotFound => "Invalid or expired token",
            AuthError::Storage(_) | AuthError::Internal(_) => "Internal server error",
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    // ---
    pub error: String,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // ---
        if matches!(self, AuthError::Storage(_) | AuthError::Internal(_)) {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message().to_string(),
        });
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn token_failures_collapse_to_unauthorized() {
        // ---
        let expired = AuthError::TokenExpired;
        let invalid = AuthError::TokenInvalid("bad signature".into());

        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.public_message(), invalid.public_message());
        assert_ne!(expired.to_string(), invalid.to_string());
    }

    #[test]
    fn counter_replay_is_indistinguishable_from_bad_signature() {
        // ---
        let replay = AuthError::CounterReplay {
            stored: 7,
            presented: 7,
        };
        let bad = AuthError::VerificationFailed("signature".into());

        assert_eq!(replay.code(), bad.code());
        assert_eq!(replay.public_message(), bad.public_message());
    }

    #[test]
    fn upstream_errors_are_server_side() {
        // ---
        let err = AuthError::UpstreamProvider("timeout".into());
        assert!(err.status().is_server_error());
    }

    #[test]
    fn storage_errors_hide_details() {
        // ---
        let err: AuthError = anyhow::anyhow!("connection refused to 10.0.0.3").into();
        assert_eq!(err.public_message(), "Internal server error");
    }
}
