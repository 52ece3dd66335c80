//! Identity provider client
//!
//! Implements the three steps of the authorization-code flow against
//! configurable endpoints (Google by default):
//!
//! 1. build the authorization URL the visitor is sent to,
//! 2. exchange the returned code for an access token,
//! 3. fetch the visitor's profile with that token.

use async_trait::async_trait;
use ::oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use reqwest::header::ACCEPT;
use std::time::Duration;

use crate::config::{ConfigError, OAuthSettings};
use crate::oauth2::http::build_client;
use crate::oauth2::types::{LoginError, TokenResponse, UserInfoResponse, SCOPES};

/// The identity provider seen by the login flow
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the login call-to-action points at
    fn authorization_url(&self) -> String;

    /// Exchange an authorization code for the token endpoint's response
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or an unparseable body. An OAuth2
    /// error payload is returned as `Ok` and surfaces through
    /// [`TokenResponse::into_access_token`].
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, LoginError>;

    /// Fetch the profile of the token's owner
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status or an
    /// unparseable body
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfoResponse, LoginError>;
}

/// OAuth2 client for a single configured provider
pub struct OAuthClient {
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_uri: RedirectUrl,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    userinfo_url: url::Url,
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// Create a client from settings
    ///
    /// # Errors
    ///
    /// Returns error if any endpoint or the redirect URI is invalid
    pub fn new(settings: &OAuthSettings) -> Result<Self, ConfigError> {
        let invalid = |field: &'static str| {
            move |e: url::ParseError| ConfigError::InvalidUrl {
                field,
                reason: e.to_string(),
            }
        };

        let http_client = build_client(Duration::from_millis(settings.timeout_ms))
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            client_id: ClientId::new(settings.client_id.clone()),
            client_secret: ClientSecret::new(settings.client_secret.clone()),
            redirect_uri: RedirectUrl::new(settings.redirect_uri.clone())
                .map_err(invalid("oauth.redirect_uri"))?,
            auth_url: AuthUrl::new(settings.authorization_url.clone())
                .map_err(invalid("oauth.authorization_url"))?,
            token_url: TokenUrl::new(settings.token_url.clone())
                .map_err(invalid("oauth.token_url"))?,
            userinfo_url: url::Url::parse(&settings.userinfo_url)
                .map_err(invalid("oauth.userinfo_url"))?,
            http_client,
        })
    }

    /// Build the authorization URL
    ///
    /// Appends `client_id`, `redirect_uri`, `response_type=code`,
    /// `scope=openid email profile`, `prompt=consent` and
    /// `access_type=offline` to the configured authorization endpoint.
    #[must_use]
    pub fn build_authorization_url(&self) -> String {
        let mut url = self.auth_url.url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", self.client_id.as_str())
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", SCOPES)
            .append_pair("prompt", "consent")
            .append_pair("access_type", "offline");
        url.into()
    }

    /// Exchange authorization code for the token endpoint's response
    ///
    /// # Errors
    ///
    /// See [`IdentityProvider::exchange_code`]
    pub async fn exchange_code_for_token(&self, code: &str) -> Result<TokenResponse, LoginError> {
        let form = [
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.secret().as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http_client
            .post(self.token_url.url().clone())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| LoginError::transport(&e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| LoginError::transport(&e))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| {
                LoginError::MalformedResponse(format!("Failed to parse token response: {e}"))
            });
        }

        // Error statuses normally carry an OAuth2 error payload
        match serde_json::from_slice::<TokenResponse>(&body) {
            Ok(token) if token.error.is_some() => Ok(token),
            _ => Err(LoginError::TokenRejected {
                error: format!("HTTP {}", status.as_u16()),
                description: None,
            }),
        }
    }

    /// Fetch user information using access token
    ///
    /// # Errors
    ///
    /// See [`IdentityProvider::fetch_user_info`]
    pub async fn fetch_user_profile(
        &self,
        access_token: &str,
    ) -> Result<UserInfoResponse, LoginError> {
        let response = self
            .http_client
            .get(self.userinfo_url.clone())
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| LoginError::transport(&e))?;

        if !response.status().is_success() {
            return Err(LoginError::ProfileRejected {
                status: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| LoginError::MalformedResponse(format!("Failed to parse JSON: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for OAuthClient {
    fn authorization_url(&self) -> String {
        self.build_authorization_url()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, LoginError> {
        self.exchange_code_for_token(code).await
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfoResponse, LoginError> {
        self.fetch_user_profile(access_token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::spawn_stub;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Form, Json, Router,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn settings(base: &str) -> OAuthSettings {
        OAuthSettings {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            redirect_uri: "http://localhost:3000/".to_string(),
            authorization_url: format!("{base}/authorize"),
            token_url: format!("{base}/token"),
            userinfo_url: format!("{base}/userinfo"),
            timeout_ms: 2_000,
        }
    }

    fn query_pairs(url: &str) -> HashMap<String, String> {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }

    #[test]
    fn test_authorization_url_generation() {
        let client = OAuthClient::new(&settings("https://example.com/oauth")).unwrap();
        let auth_url = client.build_authorization_url();

        assert!(auth_url.starts_with("https://example.com/oauth/authorize?"));
        assert!(auth_url.contains("response_type=code"));

        let params = query_pairs(&auth_url);
        assert_eq!(params["client_id"], "test-client-id");
        assert_eq!(params["redirect_uri"], "http://localhost:3000/");
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["access_type"], "offline");
        assert!(!params.contains_key("client_secret"));
    }

    #[test]
    fn test_authorization_url_keeps_existing_query() {
        let mut config = settings("https://example.com");
        config.authorization_url = "https://example.com/auth?hd=example.com".to_string();
        let client = OAuthClient::new(&config).unwrap();

        let params = query_pairs(&client.build_authorization_url());
        assert_eq!(params["hd"], "example.com");
        assert_eq!(params["scope"], SCOPES);
    }

    #[test]
    fn test_invalid_redirect_uri_is_rejected() {
        let mut config = settings("https://example.com");
        config.redirect_uri = "not a url".to_string();

        assert!(matches!(
            OAuthClient::new(&config),
            Err(ConfigError::InvalidUrl {
                field: "oauth.redirect_uri",
                ..
            })
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_authorization_url_always_requests_code_and_scopes(
            client_id in "[A-Za-z0-9._-]{1,40}",
            path in "[a-z0-9]{0,12}",
        ) {
            let mut config = settings("https://idp.example.com");
            config.client_id = client_id.clone();
            config.redirect_uri = format!("https://app.example.com/{path}");
            let client = OAuthClient::new(&config).unwrap();

            let auth_url = client.build_authorization_url();
            let params = query_pairs(&auth_url);
            proptest::prop_assert!(auth_url.contains("response_type=code"));
            proptest::prop_assert_eq!(&params["response_type"], "code");
            proptest::prop_assert_eq!(&params["scope"], "openid email profile");
            proptest::prop_assert_eq!(&params["client_id"], &client_id);
        }
    }

    #[tokio::test]
    async fn test_exchange_posts_expected_form() {
        let seen: Arc<Mutex<Option<HashMap<String, String>>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let recorder = recorder.clone();
                async move {
                    *recorder.lock() = Some(form);
                    Json(json!({"access_token": "T", "token_type": "Bearer", "expires_in": 3599}))
                }
            }),
        );
        let base = spawn_stub(app).await;
        let client = OAuthClient::new(&settings(&base)).unwrap();

        let token = client.exchange_code_for_token("abc").await.unwrap();
        assert_eq!(token.into_access_token().unwrap(), "T");

        let form = seen.lock().clone().unwrap();
        assert_eq!(form["code"], "abc");
        assert_eq!(form["client_id"], "test-client-id");
        assert_eq!(form["client_secret"], "test-client-secret");
        assert_eq!(form["redirect_uri"], "http://localhost:3000/");
        assert_eq!(form["grant_type"], "authorization_code");
    }

    #[tokio::test]
    async fn test_exchange_error_payload_is_returned() {
        let app = Router::new().route(
            "/token",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant", "error_description": "Bad Request"})),
                )
            }),
        );
        let base = spawn_stub(app).await;
        let client = OAuthClient::new(&settings(&base)).unwrap();

        let token = client.exchange_code_for_token("used-code").await.unwrap();
        assert!(matches!(
            token.into_access_token(),
            Err(LoginError::TokenRejected { error, .. }) if error == "invalid_grant"
        ));
    }

    #[tokio::test]
    async fn test_exchange_non_json_failure_is_rejected() {
        let app = Router::new().route(
            "/token",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = spawn_stub(app).await;
        let client = OAuthClient::new(&settings(&base)).unwrap();

        let err = client.exchange_code_for_token("abc").await.unwrap_err();
        assert!(matches!(err, LoginError::TokenRejected { error, .. } if error == "HTTP 502"));
    }

    #[tokio::test]
    async fn test_exchange_success_with_garbage_is_malformed() {
        let app = Router::new().route("/token", post(|| async { "<html>oops</html>" }));
        let base = spawn_stub(app).await;
        let client = OAuthClient::new(&settings(&base)).unwrap();

        let err = client.exchange_code_for_token("abc").await.unwrap_err();
        assert!(matches!(err, LoginError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_exchange_times_out() {
        let app = Router::new().route(
            "/token",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"access_token": "late"}))
            }),
        );
        let base = spawn_stub(app).await;
        let mut config = settings(&base);
        config.timeout_ms = 100;
        let client = OAuthClient::new(&config).unwrap();

        let err = client.exchange_code_for_token("abc").await.unwrap_err();
        assert!(matches!(err, LoginError::Transport(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = OAuthClient::new(&settings(&base)).unwrap();
        let err = client.exchange_code_for_token("abc").await.unwrap_err();
        assert!(matches!(err, LoginError::Transport(_)));
    }

    #[tokio::test]
    async fn test_fetch_user_profile_sends_bearer_token() {
        let app = Router::new().route(
            "/userinfo",
            get(|headers: HeaderMap| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer T");
                if authorized {
                    (
                        StatusCode::OK,
                        Json(json!({"sub": "123", "email": "a@b.com", "email_verified": true})),
                    )
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_token"})))
                }
            }),
        );
        let base = spawn_stub(app).await;
        let client = OAuthClient::new(&settings(&base)).unwrap();

        let info = client.fetch_user_profile("T").await.unwrap();
        assert_eq!(info.sub.as_deref(), Some("123"));
        assert_eq!(info.email.as_deref(), Some("a@b.com"));
        assert!(info.name.is_none());

        let err = client.fetch_user_profile("wrong").await.unwrap_err();
        assert!(matches!(err, LoginError::ProfileRejected { status: 401 }));
    }
}
