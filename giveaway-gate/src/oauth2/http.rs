//! Outbound HTTP client construction

use reqwest::{redirect, Client, ClientBuilder};
use std::time::Duration;

/// User agent sent on every outbound request
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Build the shared client for provider and store calls
///
/// Redirects are not followed: OAuth2 endpoints answer directly, and a
/// redirect there signals misconfiguration rather than something to chase.
///
/// # Errors
///
/// Returns error if the TLS backend cannot be initialized
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(redirect::Policy::none())
        .user_agent(USER_AGENT)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_user_agent_names_crate() {
        assert!(USER_AGENT.starts_with("giveaway-gate/"));
    }
}
