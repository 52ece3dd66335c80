//! OAuth2 authorization-code login
//!
//! The visitor is sent to the provider's consent screen, comes back with a
//! `code` query parameter, and [`complete_login`] turns that code into a
//! [`UserProfile`](crate::profile::UserProfile).

pub mod flow;
pub mod http;
pub mod provider;
pub mod types;

pub use flow::complete_login;
pub use provider::{IdentityProvider, OAuthClient};
pub use types::{LoginError, TokenResponse, UserInfoResponse, SCOPES};
