//! Cookie-backed visitor sessions
//!
//! A browser gets an opaque session ID cookie the first time a handler writes
//! to its session; the session contents live server-side in a
//! [`SessionStore`]. A session holds:
//!
//! - the logged-in [`UserProfile`], if any,
//! - the authorization codes already attempted, so a code is exchanged at
//!   most once per session,
//! - a one-shot flash message shown on the next page render.
//!
//! Sessions are process-local and lost on restart.

pub mod extractor;
pub mod middleware;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::profile::UserProfile;

pub use extractor::Session;
pub use middleware::SessionLayer;

/// Opaque session identifier carried in the session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Server-side contents of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Logged-in visitor
    pub profile: Option<UserProfile>,
    /// Authorization codes already attempted in this session
    pub consumed_codes: HashSet<String>,
    /// Message shown once on the next render
    pub flash: Option<String>,
    /// Session expiration time
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    /// Create an empty session living for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            profile: None,
            consumed_codes: HashSet::new(),
            flash: None,
            expires_at: Utc::now() + ttl,
        }
    }

    /// Check if session has expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Shared map of live sessions
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionData>>>,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a live session exists for `id`
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions
            .read()
            .get(id)
            .is_some_and(|data| !data.is_expired())
    }

    /// Start a new session and drop expired ones
    #[must_use]
    pub fn create(&self, ttl: Duration) -> SessionId {
        let id = SessionId::generate();
        self.update_or_insert(&id, ttl, |_| ());
        id
    }

    /// Snapshot of a session's contents
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<SessionData> {
        self.sessions
            .read()
            .get(id)
            .filter(|data| !data.is_expired())
            .cloned()
    }

    /// Apply `f` to a session's contents
    ///
    /// Returns `None` if the session does not exist or has expired.
    pub fn update<T>(&self, id: &SessionId, f: impl FnOnce(&mut SessionData) -> T) -> Option<T> {
        self.sessions
            .write()
            .get_mut(id)
            .filter(|data| !data.is_expired())
            .map(f)
    }

    /// Apply `f` to a session's contents, starting the session if needed
    ///
    /// An expired entry under `id` is replaced by an empty session. Expired
    /// sessions are pruned whenever a session is started.
    pub fn update_or_insert<T>(
        &self,
        id: &SessionId,
        ttl: Duration,
        f: impl FnOnce(&mut SessionData) -> T,
    ) -> T {
        let mut sessions = self.sessions.write();
        if sessions.get(id).is_none_or(SessionData::is_expired) {
            // Also drops an expired entry under `id`
            sessions.retain(|_, data| !data.is_expired());
        }
        f(sessions.entry(*id).or_insert_with(|| SessionData::new(ttl)))
    }

    /// Number of stored sessions, expired ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Check if the store holds no sessions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}
