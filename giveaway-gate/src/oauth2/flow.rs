//! Login completion
//!
//! Turns an authorization code into a [`UserProfile`]: exchange the code,
//! fetch the profile, then best-effort persist it. Persistence failures are
//! logged and never fail the login.

use crate::oauth2::provider::IdentityProvider;
use crate::oauth2::types::LoginError;
use crate::profile::UserProfile;
use crate::store::ProfileStore;

/// Complete a login for `code`
///
/// The userinfo endpoint is only called once an access token is in hand,
/// and the store is only written once a subject identifier is known.
///
/// # Errors
///
/// Returns the first [`LoginError`] raised by the exchange, token
/// extraction, profile fetch or profile validation.
pub async fn complete_login(
    provider: &dyn IdentityProvider,
    store: Option<&dyn ProfileStore>,
    code: &str,
) -> Result<UserProfile, LoginError> {
    let access_token = provider.exchange_code(code).await?.into_access_token()?;
    let user_info = provider.fetch_user_info(&access_token).await?;
    let profile = UserProfile::try_from(user_info)?;

    match store {
        Some(store) => {
            if let Err(e) = store.upsert_profile(&profile).await {
                tracing::warn!(
                    backend = store.backend(),
                    subject_id = %profile.subject_id,
                    error = %e,
                    "Failed to persist user profile"
                );
            } else {
                tracing::debug!(
                    backend = store.backend(),
                    subject_id = %profile.subject_id,
                    "Persisted user profile"
                );
            }
        }
        None => tracing::debug!("Persistence disabled, profile kept in session only"),
    }

    tracing::info!(subject_id = %profile.subject_id, "User logged in");
    Ok(profile)
}
