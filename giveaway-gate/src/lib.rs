//! giveaway-gate: promotional giveaway page gated behind an OAuth2 login
//!
//! Visitors see a login call-to-action until they sign in with the configured
//! identity provider (Google by default). Once signed in they get the link to
//! the entry form. Everyone sees the product videos and the voting-site link.
//!
//! On login, the visitor's profile is merged into a document store
//! (Cloud Firestore, or an in-memory map for development). Persistence is
//! best-effort and never blocks a login.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use giveaway_gate::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load()?;
//!     let provider = Arc::new(OAuthClient::new(&config.oauth)?);
//!     let store = giveaway_gate::store::init(&config.store);
//!     let bind_address = config.server.bind_address();
//!
//!     let app = router(AppState::new(config, provider, store));
//!     let listener = tokio::net::TcpListener::bind(bind_address).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

// Lint configuration is handled at the workspace level in Cargo.toml
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod oauth2;
pub mod observability;
pub mod profile;
pub mod session;
pub mod state;
pub mod store;
pub mod template;

#[cfg(test)]
pub mod testing;

use axum::{
    routing::{get, post},
    Router,
};
use axum_htmx::AutoVaryLayer;
use tower_http::trace::TraceLayer;

use crate::session::SessionLayer;
use crate::state::AppState;

pub mod prelude {
    //! Convenience re-exports for building and running the server

    pub use crate::config::AppConfig;
    pub use crate::error::GiveawayError;
    pub use crate::oauth2::{IdentityProvider, OAuthClient};
    pub use crate::profile::UserProfile;
    pub use crate::router;
    pub use crate::state::AppState;
    pub use crate::store::ProfileStore;
}

/// Build the application router
///
/// Routes: `GET /`, `POST /logout`, `GET /health`. Every route runs inside
/// the session layer, and responses to HTMX requests carry the matching
/// `Vary` headers.
pub fn router(state: AppState) -> Router {
    let sessions = SessionLayer::new(state.sessions().clone(), &state.config().session);

    Router::new()
        .route("/", get(handlers::index))
        .route("/logout", post(handlers::logout))
        .route("/health", get(handlers::health))
        .layer(sessions)
        .layer(AutoVaryLayer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
