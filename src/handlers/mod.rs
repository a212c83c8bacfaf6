// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod cookies;
mod email;
mod github;
mod health;
mod metrics;
mod root;
mod session;
mod shared_types;
mod webauthn_authenticate;
mod webauthn_credentials;
mod webauthn_register;

// Core handlers
pub use health::health_check;
pub use metrics::{metrics_handler, track_requests};
pub use root::root_handler;

// Cookie names read outside the handlers
pub use cookies::{CEREMONY_COOKIE, SESSION_COOKIE, STATE_COOKIE};

// WebAuthn registration handlers
pub use webauthn_register::{register_options, register_verify};

// WebAuthn authentication handlers
pub use webauthn_authenticate::{login_options, login_verify};

// WebAuthn credential management handlers
pub use webauthn_credentials::{delete_credential, list_credentials, rename_credential};

// GitHub OAuth handlers
pub use github::{github_callback, github_login};

// Session handlers
pub use session::{logout, me, status};

// Email token handlers
pub use email::{request_password_reset, send_verification, verify_email};
