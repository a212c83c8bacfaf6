//! The authentication core: ceremonies, identity resolution and session tokens.

pub mod identity;
pub mod oauth;
pub mod token;
pub mod verification;
pub mod webauthn;

pub use identity::IdentityResolver;
pub use oauth::{LoginRedirect, OAuthBridge, OAuthLogin};
pub use token::{ProfileClaims, SessionClaims, TokenService};
pub use verification::{
    create_log_mailer, LogMailer, Mailer, MailerPtr, OutgoingMail, VerificationService,
};
pub use webauthn::WebAuthnEngine;
