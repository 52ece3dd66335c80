//! Profile persistence
//!
//! A [`ProfileStore`] merges a [`UserProfile`] into the document
//! `<collection>/<subject_id>`. Only the fields the profile supplies are
//! written; fields already stored and absent from the profile are kept.
//!
//! The store is optional. [`init`] returns `None` when persistence is
//! disabled or cannot be set up, and logins then proceed without it.

pub mod credentials;
pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreSettings};
use crate::profile::UserProfile;

pub use firestore::FirestoreProfileStore;
pub use memory::MemoryProfileStore;

/// Profile store errors
///
/// These are only ever logged; a failed write never fails a login.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Service account key missing or unusable
    #[error("Invalid store credentials: {0}")]
    Credentials(String),

    /// Bearer token could not be obtained
    #[error("Store authentication failed: {0}")]
    Auth(String),

    /// Network failure or timeout
    #[error("Failed to reach document store: {0}")]
    Transport(String),

    /// The store answered with a non-success status
    #[error("Document store rejected the write (HTTP {status})")]
    Rejected {
        /// HTTP status code
        status: u16,
    },
}

impl StoreError {
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Document store holding one profile per subject
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Merge the profile's fields into its document, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns error if the write could not be completed
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;

    /// Backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;
}

/// Initialize the configured store
///
/// Failures are logged at `warn` and yield `None`: the process then runs
/// without persistence for its whole lifetime.
#[must_use]
pub fn init(settings: &StoreSettings) -> Option<Arc<dyn ProfileStore>> {
    match settings.backend {
        StoreBackend::Disabled => {
            tracing::info!("Profile persistence disabled");
            None
        }
        StoreBackend::Memory => {
            tracing::info!(collection = %settings.collection, "Using in-memory profile store");
            Some(Arc::new(MemoryProfileStore::new(&settings.collection)))
        }
        StoreBackend::Firestore => match FirestoreProfileStore::from_settings(settings) {
            Ok(store) => {
                tracing::info!(
                    project_id = %store.project_id(),
                    collection = %settings.collection,
                    "Using Firestore profile store"
                );
                Some(Arc::new(store))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    credentials_path = %settings.credentials_path.display(),
                    "Firestore unavailable, continuing without persistence"
                );
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_backend_has_no_store() {
        let settings = StoreSettings {
            backend: StoreBackend::Disabled,
            ..StoreSettings::default()
        };
        assert!(init(&settings).is_none());
    }

    #[test]
    fn test_memory_backend() {
        let settings = StoreSettings {
            backend: StoreBackend::Memory,
            ..StoreSettings::default()
        };
        let store = init(&settings).unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[test]
    fn test_missing_credentials_degrade_to_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            backend: StoreBackend::Firestore,
            credentials_path: dir.path().join("serviceAccountKey.json"),
            ..StoreSettings::default()
        };
        assert!(init(&settings).is_none());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StoreError::Rejected { status: 403 }.to_string(),
            "Document store rejected the write (HTTP 403)"
        );
    }
}
