//! Application state management
//!
//! Everything a handler needs is constructed once in `main` and shared
//! through [`AppState`]: no collaborator is reached through a global.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::oauth2::IdentityProvider;
use crate::session::SessionStore;
use crate::store::ProfileStore;

/// Shared application state
///
/// # Example
///
/// ```rust,no_run
/// use giveaway_gate::{config::AppConfig, oauth2::OAuthClient, state::AppState, store};
/// use std::sync::Arc;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = AppConfig::load()?;
/// let provider = Arc::new(OAuthClient::new(&config.oauth)?);
/// let store = store::init(&config.store);
/// let state = AppState::new(config, provider, store);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    provider: Arc<dyn IdentityProvider>,
    store: Option<Arc<dyn ProfileStore>>,
    sessions: SessionStore,
}

impl AppState {
    /// Create application state with an empty session store
    #[must_use]
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn IdentityProvider>,
        store: Option<Arc<dyn ProfileStore>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            provider,
            store,
            sessions: SessionStore::new(),
        }
    }

    /// Get application configuration
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Get the identity provider
    #[must_use]
    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }

    /// Get the profile store, if persistence is available
    #[must_use]
    pub fn store(&self) -> Option<&dyn ProfileStore> {
        self.store.as_deref()
    }

    /// Get the session store
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store.as_ref().map(|store| store.backend()))
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
