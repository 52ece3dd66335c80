//! Configuration management for giveaway-gate
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. Bare OAuth variables of the legacy deployment (`CLIENT_ID`,
//!    `CLIENT_SECRET`, `REDIRECT_URI`, `AUTHORIZATION_URL`, `TOKEN_URL`,
//!    `USERINFO_URL`), highest priority
//! 2. Environment variables with the `GIVEAWAY_` prefix, `__` as separator
//! 3. `./config.toml`, or the file named by `GIVEAWAY_CONFIG`
//! 4. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [oauth]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "…"
//! redirect_uri = "https://event.example.com/"
//!
//! [store]
//! backend = "firestore"
//! credentials_path = "serviceAccountKey.json"
//!
//! [content]
//! form_url = "https://forms.gle/KWozoHo9bLEamgsR7"
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "GIVEAWAY_CONFIG";

/// Prefix for structured environment overrides
pub const ENV_PREFIX: &str = "GIVEAWAY_";

/// Bare variables understood for compatibility with the legacy deployment
const LEGACY_OAUTH_VARS: [(&str, &str); 6] = [
    ("CLIENT_ID", "oauth.client_id"),
    ("CLIENT_SECRET", "oauth.client_secret"),
    ("REDIRECT_URI", "oauth.redirect_uri"),
    ("AUTHORIZATION_URL", "oauth.authorization_url"),
    ("TOKEN_URL", "oauth.token_url"),
    ("USERINFO_URL", "oauth.userinfo_url"),
];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A provider failed to load or the merged data did not deserialize
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A required value is empty
    #[error("Missing required configuration value: {0}")]
    Missing(&'static str),

    /// A URL-valued setting does not parse
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Dotted name of the offending setting
        field: &'static str,
        /// Parser message
        reason: String,
    },

    /// The outbound HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerSettings {
    /// `host:port` string suitable for `TcpListener::bind`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Identity provider settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// OAuth2 client ID
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Redirect URI registered with the provider; the page itself
    pub redirect_uri: String,

    /// Authorization endpoint
    pub authorization_url: String,

    /// Token endpoint
    pub token_url: String,

    /// UserInfo endpoint
    pub userinfo_url: String,

    /// Timeout applied to each outbound provider call, in milliseconds
    pub timeout_ms: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:3000/".to_string(),
            authorization_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl fmt::Debug for OAuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorization_url", &self.authorization_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Document store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Cloud Firestore over its REST API
    Firestore,
    /// In-process map, lost on restart
    Memory,
    /// No persistence
    Disabled,
}

impl StoreBackend {
    /// Get the backend as a string (lowercase)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Firestore => "firestore",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        }
    }
}

/// Profile persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Which backend to initialize at startup
    pub backend: StoreBackend,

    /// Service account key file for the Firestore backend
    pub credentials_path: PathBuf,

    /// Collection holding one document per subject
    pub collection: String,

    /// Firestore REST root
    pub base_url: String,

    /// Timeout for each store request, in milliseconds
    pub timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Firestore,
            credentials_path: PathBuf::from("serviceAccountKey.json"),
            collection: "users".to_string(),
            base_url: "https://firestore.googleapis.com".to_string(),
            timeout_ms: 5_000,
        }
    }
}

/// Session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Cookie carrying the session ID
    pub cookie_name: String,

    /// Session lifetime in seconds
    pub max_age_secs: u64,

    /// Enable secure cookies (HTTPS only)
    pub secure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "giveaway_session".to_string(),
            max_age_secs: 86400, // 24 hours
            secure: !cfg!(debug_assertions),
        }
    }
}

/// Marketing content shown on the page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// Page heading and document title
    pub title: String,

    /// Entry form, shown only to logged-in visitors
    pub form_url: String,

    /// Embedded product introduction video
    pub product_video_url: String,

    /// Embedded review video
    pub review_video_url: String,

    /// External blind-test voting site
    pub vote_url: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            title: "이기릿 채널 증정 이벤트!".to_string(),
            form_url: "https://forms.gle/KWozoHo9bLEamgsR7".to_string(),
            product_video_url: "https://www.youtube.com/embed/Hq2a2Rqllsw".to_string(),
            review_video_url: "https://www.youtube.com/embed/5TomH-UUZGQ".to_string(),
            vote_url: "https://vote.eegirit.com".to_string(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Service name attached to startup logs
    pub service_name: String,

    /// Emit JSON lines instead of pretty output
    pub json: bool,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            service_name: "giveaway-gate".to_string(),
            json: !cfg!(debug_assertions),
        }
    }
}

/// Complete giveaway-gate configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerSettings,

    /// Identity provider
    #[serde(default)]
    pub oauth: OAuthSettings,

    /// Profile persistence
    #[serde(default)]
    pub store: StoreSettings,

    /// Session cookie
    #[serde(default)]
    pub session: SessionSettings,

    /// Page content
    #[serde(default)]
    pub content: ContentSettings,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

impl AppConfig {
    /// Load and validate configuration from all sources
    ///
    /// Reads `./config.toml` unless `GIVEAWAY_CONFIG` names another file.
    /// A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map_or_else(|| PathBuf::from("config.toml"), PathBuf::from);
        Self::load_from(&path)
    }

    /// Load and validate configuration using a specific file
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use giveaway_gate::config::AppConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = AppConfig::load_from("./config/production.toml".as_ref())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Layered providers, without extraction
    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(legacy_oauth_env())
    }

    /// Check required values and URL syntax
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("oauth.client_id"));
        }
        if self.oauth.client_secret.trim().is_empty() {
            return Err(ConfigError::Missing("oauth.client_secret"));
        }

        let urls = [
            ("oauth.redirect_uri", &self.oauth.redirect_uri),
            ("oauth.authorization_url", &self.oauth.authorization_url),
            ("oauth.token_url", &self.oauth.token_url),
            ("oauth.userinfo_url", &self.oauth.userinfo_url),
            ("store.base_url", &self.store.base_url),
            ("content.form_url", &self.content.form_url),
            ("content.product_video_url", &self.content.product_video_url),
            ("content.review_video_url", &self.content.review_video_url),
            ("content.vote_url", &self.content.vote_url),
        ];
        for (field, value) in urls {
            url::Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
                field,
                reason: e.to_string(),
            })?;
        }

        if self.store.collection.trim().is_empty() {
            return Err(ConfigError::Missing("store.collection"));
        }

        Ok(())
    }
}

/// Maps the bare OAuth variables onto their `oauth.*` keys
fn legacy_oauth_env() -> Env {
    Env::raw()
        .only(&LEGACY_OAUTH_VARS.map(|(var, _)| var))
        .map(|key| {
            LEGACY_OAUTH_VARS
                .iter()
                .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
                .map_or(key.as_str(), |(_, path)| *path)
                .to_string()
                .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn configured() -> AppConfig {
        let mut config = AppConfig::default();
        config.oauth.client_id = "client-123".to_string();
        config.oauth.client_secret = "secret-456".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.oauth.timeout_ms, 10_000);
        assert_eq!(config.store.backend, StoreBackend::Firestore);
        assert_eq!(config.store.collection, "users");
        assert_eq!(config.session.max_age_secs, 86400);
    }

    #[test]
    fn test_defaults_require_client_credentials() {
        let err = AppConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("oauth.client_id")));

        let mut config = AppConfig::default();
        config.oauth.client_id = "client-123".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("oauth.client_secret")));
    }

    #[test]
    fn test_configured_defaults_validate() {
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let mut config = configured();
        config.oauth.token_url = "not a url".to_string();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrl {
                field: "oauth.token_url",
                ..
            }
        ));
    }

    #[test]
    fn test_http_client_error_is_not_a_url_error() {
        let source = reqwest::Client::builder()
            .user_agent("bad\nagent")
            .build()
            .unwrap_err();
        let err = ConfigError::HttpClient(source);

        assert!(err.to_string().starts_with("Failed to build HTTP client: "));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[oauth]
client_id = "from-file"
client_secret = "file-secret"
redirect_uri = "https://event.example.com/"

[store]
backend = "memory"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.oauth.client_id, "from-file");
        assert_eq!(config.oauth.redirect_uri, "https://event.example.com/");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        // untouched sections keep their defaults
        assert_eq!(config.content.vote_url, "https://vote.eegirit.com");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let figment = AppConfig::figment(&dir.path().join("absent.toml"));
        let config: AppConfig = figment.extract().unwrap();
        assert_eq!(config.server.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_debug_redacts_client_secret() {
        let rendered = format!("{:?}", configured().oauth);
        assert!(rendered.contains("client-123"));
        assert!(!rendered.contains("secret-456"));
    }

    #[test]
    fn test_store_backend_as_str() {
        assert_eq!(StoreBackend::Firestore.as_str(), "firestore");
        assert_eq!(StoreBackend::Memory.as_str(), "memory");
        assert_eq!(StoreBackend::Disabled.as_str(), "disabled");
    }
}
