//! Google service account authentication
//!
//! Signs an RS256 JWT assertion with the service account's private key and
//! trades it at the key's `token_uri` for a short-lived bearer token
//! (the OAuth2 JWT bearer grant). Tokens are cached until shortly before
//! they expire.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::StoreError;

/// OAuth2 scope granting Firestore access
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Service account key file contents
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account identity, used as JWT issuer
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    /// Token endpoint for the JWT bearer grant
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// Google Cloud project holding the database
    pub project_id: String,
}

impl ServiceAccountKey {
    /// Read a key file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a service account key
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Credentials(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Parse key file contents
    ///
    /// # Errors
    ///
    /// Returns error if required fields are missing
    pub fn from_json(contents: &str) -> Result<Self, StoreError> {
        serde_json::from_str(contents)
            .map_err(|e| StoreError::Credentials(format!("Invalid service account key: {e}")))
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[redacted]")
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct GrantResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
}

struct CachedToken {
    token: String,
    refresh_at: DateTime<Utc>,
}

/// Bearer token source for a service account
pub struct TokenSource {
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    http_client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    /// Create a token source, validating the private key up front
    ///
    /// # Errors
    ///
    /// Returns error if the private key is not a PEM-encoded RSA key
    pub fn new(key: &ServiceAccountKey, http_client: reqwest::Client) -> Result<Self, StoreError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Credentials(format!("Invalid private key: {e}")))?;

        Ok(Self {
            client_email: key.client_email.clone(),
            token_uri: key.token_uri.clone(),
            signing_key,
            http_client,
            cached: Mutex::new(None),
        })
    }

    /// Sign the JWT assertion for the bearer grant
    ///
    /// # Errors
    ///
    /// Returns error if signing fails
    pub fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| StoreError::Credentials(format!("Failed to sign assertion: {e}")))
    }

    /// Current bearer token, fetching a new one when the cache is stale
    ///
    /// # Errors
    ///
    /// Returns error if the token endpoint cannot be reached or refuses the grant
    pub async fn access_token(&self) -> Result<String, StoreError> {
        let now = Utc::now();
        if let Some(token) = self.cached_token(now) {
            return Ok(token);
        }

        let assertion = self.sign_assertion(now)?;
        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|e| StoreError::transport(&e))?;

        let status = response.status();
        let grant: GrantResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("HTTP {}: {e}", status.as_u16())))?;

        if let Some(error) = grant.error {
            return Err(StoreError::Auth(error));
        }
        if !status.is_success() {
            return Err(StoreError::Auth(format!("HTTP {}", status.as_u16())));
        }
        let token = grant
            .access_token
            .ok_or_else(|| StoreError::Auth("Token response missing access_token".to_string()))?;

        let lifetime = grant.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        *self.cached.lock() = Some(CachedToken {
            token: token.clone(),
            refresh_at: now + Duration::seconds(lifetime - EXPIRY_MARGIN_SECS),
        });

        tracing::debug!(expires_in = lifetime, "Obtained store access token");
        Ok(token)
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub fn invalidate(&self) {
        *self.cached.lock() = None;
    }

    fn cached_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.cached
            .lock()
            .as_ref()
            .filter(|cached| now < cached.refresh_at)
            .map(|cached| cached.token.clone())
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSource")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}
