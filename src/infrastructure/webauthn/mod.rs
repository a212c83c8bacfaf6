//! WebAuthn configuration, builder and the webauthn-rs backed verifier.
//!
//! Stored verification material is the JSON form of a webauthn-rs [`Passkey`]
//! (base64url encoded in the credential row), so the library's own credential
//! bookkeeping survives between ceremonies. Ceremonies are driven through
//! [`WebauthnCore`] so user verification can be `preferred` rather than the
//! `required` that the passkey helpers hard-code.

use anyhow::{anyhow, ensure, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;
use webauthn_rs::prelude::Passkey;
use webauthn_rs::{WebauthnBuilder, DEFAULT_AUTHENTICATOR_TIMEOUT};
use webauthn_rs_core::proto::{
    AttestationConveyancePreference, AuthenticationState, COSEAlgorithm,
    Credential as WebauthnCredential, CredentialID, Mediation, PublicKeyCredential,
    RegisterPublicKeyCredential, RegistrationState, RequestAuthenticationExtensions,
    RequestChallengeResponse, RequestRegistrationExtensions, UserVerificationPolicy,
};
use webauthn_rs_core::WebauthnCore;

use crate::config::WebAuthnConfig;
use crate::domain::{
    CeremonyChallenge, Credential, PasskeyVerifier, PasskeyVerifierPtr, RegisteredPasskey,
    VerifiedAssertion,
};

/// User verification asked of the authenticator in every ceremony.
pub const USER_VERIFICATION: UserVerificationPolicy = UserVerificationPolicy::Preferred;

/// Creates a configured WebAuthn instance from application config.
///
/// # Errors
/// Returns an error if the origin URL or RP ID are malformed.
pub fn create_webauthn(config: &WebAuthnConfig) -> Result<WebauthnCore> {
    // ---
    tracing::debug!("Creating with config:{:?}", config);

    let url = Url::from_str(config.origin.as_str())?;
    // The builder rejects an RP ID that does not cover the origin host.
    WebauthnBuilder::new(&config.rp_id, &url)?;

    Ok(WebauthnCore::new_unsafe_experts_only(
        &config.rp_name,
        &config.rp_id,
        vec![url],
        DEFAULT_AUTHENTICATOR_TIMEOUT,
        None,
        None,
    ))
}

/// Verifier backed by webauthn-rs for the configured relying party.
pub fn create_webauthn_verifier(config: &WebAuthnConfig) -> Result<PasskeyVerifierPtr> {
    // ---
    Ok(Arc::new(WebauthnRsVerifier {
        core: create_webauthn(config)?,
    }))
}

/// Parked login state; the flow decides how the assertion is finished.
#[derive(Serialize, Deserialize)]
#[serde(tag = "flow", content = "state", rename_all = "snake_case")]
enum ParkedLogin {
    Passkey(AuthenticationState),
    Discoverable(AuthenticationState),
}

pub struct WebauthnRsVerifier {
    // ---
    core: WebauthnCore,
}

fn encode_passkey(passkey: &Passkey) -> Result<Vec<u8>> {
    // ---
    serde_json::to_vec(passkey).context("failed to serialize passkey")
}

fn decode_passkey(credential: &Credential) -> Result<Passkey> {
    // ---
    let bytes = URL_SAFE_NO_PAD
        .decode(&credential.public_key)
        .context("stored public key is not base64url")?;
    serde_json::from_slice(&bytes).context("stored public key is not a passkey")
}

fn client_transports(response: &Value) -> Option<Vec<String>> {
    // ---
    let transports: Vec<String> = response
        .pointer("/response/transports")?
        .as_array()?
        .iter()
        .filter_map(|t| t.as_str().map(str::to_string))
        .collect();
    (!transports.is_empty()).then_some(transports)
}

impl WebauthnRsVerifier {
    // ---
    fn authentication_challenge(
        &self,
        credentials: Vec<WebauthnCredential>,
        extensions: Option<RequestAuthenticationExtensions>,
        allow_backup_eligible_upgrade: bool,
    ) -> Result<(RequestChallengeResponse, AuthenticationState)> {
        // ---
        let builder = self
            .core
            .new_challenge_authenticate_builder(credentials, Some(USER_VERIFICATION))?
            .extensions(extensions)
            .allow_backup_eligible_upgrade(allow_backup_eligible_upgrade)
            .hints(None);

        Ok(self.core.generate_challenge_authenticate(builder)?)
    }
}

impl PasskeyVerifier for WebauthnRsVerifier {
    // ---
    fn start_registration(
        &self,
        user_id: Uuid,
        username: &str,
        display_name: &str,
        existing: &[Credential],
    ) -> Result<CeremonyChallenge> {
        // ---
        let exclude = existing
            .iter()
            .map(|c| {
                URL_SAFE_NO_PAD
                    .decode(&c.credential_id)
                    .map(CredentialID::from)
                    .context("stored credential id is not base64url")
            })
            .collect::<Result<Vec<_>>>()?;
        let exclude = (!exclude.is_empty()).then_some(exclude);

        let extensions = RequestRegistrationExtensions {
            cred_protect: None,
            uvm: Some(true),
            cred_props: Some(true),
            min_pin_length: None,
            hmac_create_secret: None,
        };

        let builder = self
            .core
            .new_challenge_register_builder(user_id.as_bytes(), username, display_name)?
            .attestation(AttestationConveyancePreference::None)
            .credential_algorithms(COSEAlgorithm::secure_algs())
            .require_resident_key(false)
            .authenticator_attachment(None)
            .user_verification_policy(USER_VERIFICATION)
            .reject_synchronised_authenticators(false)
            .exclude_credentials(exclude)
            .hints(None)
            .extensions(Some(extensions));

        let (options, state) = self.core.generate_challenge_register(builder)?;

        let mut options = serde_json::to_value(options)?;
        // Ask for a discoverable credential so usernameless login works.
        if let Some(selection) = options.pointer_mut("/publicKey/authenticatorSelection") {
            selection["residentKey"] = json!("preferred");
        }

        Ok(CeremonyChallenge {
            options,
            state: serde_json::to_value::<RegistrationState>(state)?,
        })
    }

    fn finish_registration(&self, response: &Value, state: &Value) -> Result<RegisteredPasskey> {
        // ---
        let credential: RegisterPublicKeyCredential = serde_json::from_value(response.clone())
            .context("malformed registration response")?;
        let state: RegistrationState =
            serde_json::from_value(state.clone()).context("malformed registration state")?;

        let registered = self.core.register_credential(&credential, &state, None)?;
        let counter = registered.counter;
        let backup_eligible = registered.backup_eligible;
        let backed_up = registered.backup_state;
        let passkey = Passkey::from(registered);

        Ok(RegisteredPasskey {
            credential_id: passkey.cred_id().to_vec(),
            public_key: encode_passkey(&passkey)?,
            counter,
            backed_up,
            device_type: if backup_eligible {
                "multiDevice".into()
            } else {
                "singleDevice".into()
            },
            transports: client_transports(response),
        })
    }

    fn start_authentication(&self, allowed: Option<&[Credential]>) -> Result<CeremonyChallenge> {
        // ---
        let (options, state) = match allowed {
            Some(credentials) => {
                let credentials = credentials
                    .iter()
                    .map(|c| decode_passkey(c).map(WebauthnCredential::from))
                    .collect::<Result<Vec<_>>>()?;
                let (options, state) = self.authentication_challenge(credentials, None, true)?;
                (options, ParkedLogin::Passkey(state))
            }
            None => {
                let extensions = RequestAuthenticationExtensions {
                    appid: None,
                    uvm: Some(true),
                    hmac_get_secret: None,
                };
                let (mut options, state) =
                    self.authentication_challenge(Vec::new(), Some(extensions), false)?;
                options.mediation = Some(Mediation::Conditional);
                (options, ParkedLogin::Discoverable(state))
            }
        };

        Ok(CeremonyChallenge {
            options: serde_json::to_value(options)?,
            state: serde_json::to_value(state)?,
        })
    }

    fn finish_authentication(
        &self,
        response: &Value,
        state: &Value,
        credential: &Credential,
    ) -> Result<VerifiedAssertion> {
        // ---
        let assertion: PublicKeyCredential = serde_json::from_value(response.clone())
            .context("malformed authentication response")?;
        let state: ParkedLogin =
            serde_json::from_value(state.clone()).context("malformed authentication state")?;
        let mut passkey = decode_passkey(credential)?;

        let result = match state {
            ParkedLogin::Passkey(state) => self.core.authenticate_credential(&assertion, &state)?,
            ParkedLogin::Discoverable(mut state) => {
                let user_handle = assertion
                    .get_user_unique_id()
                    .and_then(|handle| Uuid::from_slice(handle).ok())
                    .ok_or_else(|| anyhow!("assertion carries no usable user handle"))?;
                ensure!(
                    user_handle == credential.user_id,
                    "user handle does not match credential owner"
                );
                state.set_allowed_credentials(vec![WebauthnCredential::from(passkey.clone())]);
                self.core.authenticate_credential(&assertion, &state)?
            }
        };

        ensure!(
            result.cred_id().to_vec() == passkey.cred_id().to_vec(),
            "assertion was made by a different credential"
        );
        passkey
            .update_credential(&result)
            .ok_or_else(|| anyhow!("assertion does not belong to stored passkey"))?;

        Ok(VerifiedAssertion {
            credential_id: result.cred_id().to_vec(),
            counter: result.counter(),
            backed_up: result.backup_state(),
            public_key: encode_passkey(&passkey)?,
        })
    }
}
