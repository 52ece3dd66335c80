//! Session extractor
//!
//! The session is placed in request extensions by
//! [`SessionMiddleware`](super::middleware::SessionMiddleware). Every
//! accessor reads or writes the shared store directly, so changes are visible
//! to the next request without a save step. Reads never start a session;
//! the first write does.

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Duration;

use super::{SessionId, SessionStore};
use crate::error::GiveawayError;
use crate::profile::UserProfile;

/// Handle on the current visitor's session
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    store: SessionStore,
    ttl: Duration,
}

impl Session {
    pub(crate) const fn new(id: SessionId, store: SessionStore, ttl: Duration) -> Self {
        Self { id, store, ttl }
    }

    /// Session ID
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Logged-in visitor, if any
    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.store.get(&self.id).and_then(|data| data.profile)
    }

    /// Record a successful login
    pub fn set_profile(&self, profile: UserProfile) {
        self.store
            .update_or_insert(&self.id, self.ttl, |data| data.profile = Some(profile));
    }

    /// Forget the logged-in visitor, returning who it was
    pub fn clear_profile(&self) -> Option<UserProfile> {
        self.store
            .update(&self.id, |data| data.profile.take())
            .flatten()
    }

    /// Mark an authorization code as attempted
    ///
    /// Returns `true` the first time a code is seen in this session and
    /// `false` on every later call with the same code.
    pub fn consume_code(&self, code: &str) -> bool {
        self.store.update_or_insert(&self.id, self.ttl, |data| {
            data.consumed_codes.insert(code.to_string())
        })
    }

    /// Set the message shown on the next render
    pub fn set_flash(&self, message: impl Into<String>) {
        let message = message.into();
        self.store
            .update_or_insert(&self.id, self.ttl, |data| data.flash = Some(message));
    }

    /// Take the pending message, clearing it
    #[must_use]
    pub fn take_flash(&self) -> Option<String> {
        self.store
            .update(&self.id, |data| data.flash.take())
            .flatten()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = GiveawayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(GiveawayError::SessionMissing)
    }
}
