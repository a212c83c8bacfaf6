//! Find-or-create of local users from verified third-party identities.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::domain::{LinkedIdentity, NewIdentityOutcome, ProviderProfile, RepositoryPtr, User};
use crate::error::{AuthError, AuthResult};

/// Bound on re-resolution after losing a uniqueness race.
const MAX_ATTEMPTS: usize = 4;

/// Resolves a provider profile to exactly one local user.
#[derive(Clone)]
pub struct IdentityResolver {
    // ---
    repository: RepositoryPtr,
}

impl IdentityResolver {
    // ---
    pub fn new(repository: RepositoryPtr) -> Self {
        // ---
        Self { repository }
    }

    /// Return the user bound to `profile`, linking or creating as needed.
    ///
    /// 1. Existing `provider:id` key → its owner, unchanged.
    /// 2. Existing user with the same verified email → link the key to that
    ///    user. An unverified holder of the address is released first.
    /// 3. Otherwise create user and key together.
    ///
    /// Losing a race at step 2 or 3 (someone else inserted the key, the email
    /// or the username first) restarts resolution, so concurrent first logins
    /// converge on one user.
    pub async fn find_or_create(&self, profile: &ProviderProfile) -> AuthResult<User> {
        // ---
        let key = LinkedIdentity::key(&profile.provider, &profile.provider_user_id);
        let mut username_suffix: Option<String> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            // ---
            if let Some(user) = self.find_by_identity(profile).await? {
                tracing::debug!("Resolved {} to existing user {}", key, user.id);
                return Ok(user);
            }

            if let Some(email) = profile.email.as_deref() {
                if let Some(user) = self.repository.find_user_by_email(email).await? {
                    if user.email_verified.is_none() {
                        tracing::warn!(
                            "User {} holds {} unverified; releasing it for {}",
                            user.id,
                            email,
                            key
                        );
                        self.repository.release_unverified_email(email).await?;
                        continue;
                    }

                    let identity =
                        LinkedIdentity::new(user.id, &profile.provider, &profile.provider_user_id);
                    if self.repository.link_identity(identity).await? {
                        tracing::info!("Linked {} to existing user {} by email", key, user.id);
                        return Ok(user);
                    }
                    tracing::debug!("Identity {} linked concurrently, re-resolving", key);
                    continue;
                }
            }

            let user = new_user_from(profile, username_suffix.as_deref());
            let identity = LinkedIdentity::new(user.id, &profile.provider, &profile.provider_user_id);

            match self
                .repository
                .insert_user_and_linked_identity(user, identity)
                .await?
            {
                NewIdentityOutcome::Created(user) => {
                    tracing::info!("Created user {} for {}", user.id, key);
                    return Ok(user);
                }
                NewIdentityOutcome::UsernameTaken => {
                    tracing::debug!("Username taken on attempt {}, adding suffix", attempt);
                    username_suffix = Some(random_suffix());
                }
                NewIdentityOutcome::IdentityExists | NewIdentityOutcome::EmailTaken => {
                    tracing::debug!("Lost creation race for {}, re-resolving", key);
                }
            }
        }

        Err(AuthError::Internal(format!(
            "could not resolve identity {key} after {MAX_ATTEMPTS} attempts"
        )))
    }

    async fn find_by_identity(&self, profile: &ProviderProfile) -> AuthResult<Option<User>> {
        // ---
        let Some(identity) = self
            .repository
            .find_linked_identity(&profile.provider, &profile.provider_user_id)
            .await?
        else {
            return Ok(None);
        };

        let user = self
            .repository
            .get_user_by_id(identity.user_id)
            .await?
            .ok_or_else(|| {
                AuthError::Internal(format!("identity {} points at a missing user", identity.id))
            })?;

        Ok(Some(user))
    }
}

/// Build the record for a first-time login.
///
/// Username: profile username, else the email local part, else `user_<random>`.
/// The provider already verified the email, so it is stamped verified now.
fn new_user_from(profile: &ProviderProfile, suffix: Option<&str>) -> User {
    // ---
    let base = profile
        .username
        .clone()
        .filter(|u| !u.trim().is_empty())
        .or_else(|| {
            profile
                .email
                .as_deref()
                .and_then(|e| e.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("user_{}", random_suffix()));

    let username = match suffix {
        Some(suffix) => format!("{base}_{suffix}"),
        None => base,
    };

    let mut user = User::new(username);
    user.email = profile.email.clone();
    user.email_verified = profile.email.as_ref().map(|_| Utc::now());
    user.name = profile.name.clone().or_else(|| profile.username.clone());
    user.avatar_url = profile.avatar_url.clone();
    user
}

fn random_suffix() -> String {
    // ---
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}
