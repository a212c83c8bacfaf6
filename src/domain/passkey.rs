//! Cryptographic boundary of the passkey ceremonies.
//!
//! The WebAuthn engine drives ceremonies through [`PasskeyVerifier`] so that the
//! protocol library stays behind one seam. Options, ceremony state and client
//! responses cross it as JSON values: options go to the browser untouched, state
//! is parked in the challenge store between the two halves of a ceremony.

use super::models::Credential;
use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Options to hand to the browser plus the state needed to verify its answer.
#[derive(Debug, Clone)]
pub struct CeremonyChallenge {
    // ---
    pub options: Value,
    pub state: Value,
}

/// Material extracted from a verified attestation.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredPasskey {
    // ---
    pub credential_id: Vec<u8>,
    pub public_key: Vec<u8>,
    pub counter: u32,
    pub backed_up: bool,
    pub device_type: String,
    pub transports: Option<Vec<String>>,
}

/// Material extracted from a verified assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAssertion {
    // ---
    pub credential_id: Vec<u8>,

    /// Counter reported by the authenticator for this assertion.
    pub counter: u32,

    pub backed_up: bool,

    /// Verification material after applying the assertion's updates.
    pub public_key: Vec<u8>,
}

/// Relying-party side of the WebAuthn protocol.
///
/// Implementations validate challenge, origin and RP id; they never touch the
/// store. All failures are reported as errors, never as partial results.
pub trait PasskeyVerifier: Send + Sync {
    // ---
    fn start_registration(
        &self,
        user_id: Uuid,
        username: &str,
        display_name: &str,
        existing: &[Credential],
    ) -> Result<CeremonyChallenge>;

    fn finish_registration(&self, response: &Value, state: &Value) -> Result<RegisteredPasskey>;

    /// `allowed = None` starts a discoverable-credential ceremony.
    fn start_authentication(&self, allowed: Option<&[Credential]>) -> Result<CeremonyChallenge>;

    fn finish_authentication(
        &self,
        response: &Value,
        state: &Value,
        credential: &Credential,
    ) -> Result<VerifiedAssertion>;
}

pub type PasskeyVerifierPtr = Arc<dyn PasskeyVerifier>;
