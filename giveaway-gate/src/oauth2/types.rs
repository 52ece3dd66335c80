//! Provider response records and login errors
//!
//! Responses from the identity provider are deserialized into explicit
//! optional-field records at the boundary and validated once, rather than
//! passed around as open maps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scope string requested from the provider
pub const SCOPES: &str = "openid email profile";

/// Token endpoint response
///
/// Every field is optional: a successful exchange carries `access_token`,
/// a rejected one carries `error` (and usually `error_description`).
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer credential for the userinfo endpoint
    pub access_token: Option<String>,
    /// OpenID Connect ID token (unused)
    pub id_token: Option<String>,
    /// Lifetime of the access token in seconds (unused)
    pub expires_in: Option<u64>,
    /// Token type, normally `Bearer`
    pub token_type: Option<String>,
    /// Granted scopes
    pub scope: Option<String>,
    /// OAuth2 error code
    pub error: Option<String>,
    /// Human-readable error detail
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Response carrying only an access token
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Extract the access token, or the reason the exchange failed
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::TokenRejected`] when the provider sent an error
    /// payload and [`LoginError::MissingAccessToken`] when it sent neither.
    pub fn into_access_token(self) -> Result<String, LoginError> {
        if let Some(error) = self.error {
            return Err(LoginError::TokenRejected {
                error,
                description: self.error_description,
            });
        }

        self.access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or(LoginError::MissingAccessToken)
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[redacted]");
        f.debug_struct("TokenResponse")
            .field("access_token", &redact(&self.access_token))
            .field("id_token", &redact(&self.id_token))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("error", &self.error)
            .field("error_description", &self.error_description)
            .finish()
    }
}

/// UserInfo endpoint response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfoResponse {
    /// Stable subject identifier
    pub sub: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Avatar/profile picture URL
    pub picture: Option<String>,
}

/// Login failures
///
/// None of these is fatal: each one is shown to the visitor as a failed
/// login they can retry from the login link.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// The provider redirected back with an error instead of a code
    #[error("Authorization was not granted: {error}")]
    ConsentDenied {
        /// OAuth2 error code, e.g. `access_denied`
        error: String,
        /// Human-readable error detail
        description: Option<String>,
    },

    /// The token endpoint answered with an error payload
    #[error("Token endpoint rejected the authorization code: {error}")]
    TokenRejected {
        /// OAuth2 error code, e.g. `invalid_grant`
        error: String,
        /// Human-readable error detail
        description: Option<String>,
    },

    /// The token endpoint answered without an access token
    #[error("Token response did not contain an access token")]
    MissingAccessToken,

    /// The userinfo endpoint answered with a non-success status
    #[error("UserInfo endpoint rejected the access token (HTTP {status})")]
    ProfileRejected {
        /// HTTP status code
        status: u16,
    },

    /// The profile has no subject identifier
    #[error("Profile did not contain a subject identifier")]
    MissingSubject,

    /// Network failure or timeout talking to the provider
    #[error("Failed to reach identity provider: {0}")]
    Transport(String),

    /// The provider's body was not the JSON we expect
    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl LoginError {
    /// Short machine-friendly name for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConsentDenied { .. } => "consent_denied",
            Self::TokenRejected { .. } => "token_rejected",
            Self::MissingAccessToken => "missing_access_token",
            Self::ProfileRejected { .. } => "profile_rejected",
            Self::MissingSubject => "missing_subject",
            Self::Transport(_) => "transport",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
