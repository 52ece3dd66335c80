//! Session middleware
//!
//! Resolves the session cookie to a live session, exposes it to handlers
//! through request extensions, and sets the cookie when a handler started a
//! new session. A request whose cookie is absent, malformed or stale gets a
//! fresh ID that is only stored once a handler writes to it, so anonymous
//! traffic leaves no server-side state.

use axum::{
    body::Body,
    extract::Request,
    http::header::{COOKIE, SET_COOKIE},
    response::Response,
};
use chrono::Duration;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::{Session, SessionId, SessionStore};
use crate::config::SessionSettings;

/// Upper bound on session lifetime, matching what browsers honor for Max-Age
const MAX_AGE_CAP_SECS: u64 = 400 * 24 * 60 * 60;

/// Layer for session middleware
#[derive(Clone, Debug)]
pub struct SessionLayer {
    settings: Arc<SessionSettings>,
    store: SessionStore,
}

impl SessionLayer {
    /// Create a session layer over `store`
    #[must_use]
    pub fn new(store: SessionStore, settings: &SessionSettings) -> Self {
        Self {
            settings: Arc::new(settings.clone()),
            store,
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            settings: self.settings.clone(),
            store: self.store.clone(),
        }
    }
}

/// Session middleware that handles cookie-based sessions
#[derive(Clone, Debug)]
pub struct SessionMiddleware<S> {
    inner: S,
    settings: Arc<SessionSettings>,
    store: SessionStore,
}

impl<S> Service<Request> for SessionMiddleware<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let settings = self.settings.clone();
        let store = self.store.clone();
        // Drive the clone that was polled ready
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (session_id, is_known) = match extract_session_id(&req, &settings.cookie_name) {
                Some(id) if store.contains(&id) => (id, true),
                _ => (SessionId::generate(), false),
            };

            req.extensions_mut().insert(Session::new(
                session_id,
                store.clone(),
                session_ttl(&settings),
            ));

            let mut response = inner.call(req).await?;

            if !is_known && store.contains(&session_id) {
                set_session_cookie(&mut response, &session_id, &settings);
            }

            Ok(response)
        })
    }
}

fn session_ttl(settings: &SessionSettings) -> Duration {
    let secs = settings.max_age_secs.min(MAX_AGE_CAP_SECS);
    Duration::seconds(i64::try_from(secs).unwrap_or_default())
}

/// Extract session ID from request cookies
fn extract_session_id(req: &Request, cookie_name: &str) -> Option<SessionId> {
    let cookie_str = req.headers().get(COOKIE)?.to_str().ok()?;

    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .and_then(|(_, value)| SessionId::from_str(value.trim()).ok())
}

/// Set session cookie on response
fn set_session_cookie(
    response: &mut Response<Body>,
    session_id: &SessionId,
    settings: &SessionSettings,
) {
    let mut cookie_value = format!(
        "{}={session_id}; Path=/; Max-Age={}; SameSite=Lax; HttpOnly",
        settings.cookie_name,
        settings.max_age_secs.min(MAX_AGE_CAP_SECS),
    );

    if settings.secure {
        cookie_value.push_str("; Secure");
    }

    if let Ok(header_value) = cookie_value.parse() {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn settings() -> SessionSettings {
        SessionSettings {
            cookie_name: "test_session".to_string(),
            max_age_secs: 600,
            secure: false,
        }
    }

    fn app(store: SessionStore) -> Router {
        Router::new()
            .route(
                "/",
                get(|session: Session| async move { session.id().to_string() }),
            )
            .route(
                "/flash",
                get(|session: Session| async move {
                    session.set_flash("hello");
                    session.id().to_string()
                }),
            )
            .layer(SessionLayer::new(store, &settings()))
    }

    fn request_to(uri: &str, cookie: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn request(cookie: Option<&str>) -> Request {
        request_to("/", cookie)
    }

    #[tokio::test]
    async fn test_anonymous_reads_leave_no_session() {
        let store = SessionStore::new();
        let app = app(store.clone());

        for _ in 0..50 {
            let response = app.clone().oneshot(request(None)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(SET_COOKIE).is_none());
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_first_write_sets_cookie() {
        let store = SessionStore::new();
        let response = app(store.clone())
            .oneshot(request_to("/flash", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("test_session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=600"));
        assert!(!cookie.contains("Secure"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_known_session_is_reused() {
        let store = SessionStore::new();
        let id = store.create(chrono::Duration::hours(1));

        let response = app(store.clone())
            .oneshot(request(Some(&format!("other=1; test_session={id}"))))
            .await
            .unwrap();

        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body, id.to_string());
    }

    #[tokio::test]
    async fn test_unknown_session_is_replaced_on_write() {
        let store = SessionStore::new();
        let stale = SessionId::generate();
        let cookie = format!("test_session={stale}");

        let read = app(store.clone())
            .oneshot(request(Some(&cookie)))
            .await
            .unwrap();
        assert!(read.headers().get(SET_COOKIE).is_none());

        let write = app(store.clone())
            .oneshot(request_to("/flash", Some(&cookie)))
            .await
            .unwrap();
        let set_cookie = write.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(!set_cookie.contains(&stale.to_string()));
        assert!(!store.contains(&stale));
    }

    #[test]
    fn test_session_ttl_is_capped() {
        let forever = SessionSettings {
            max_age_secs: u64::MAX,
            ..settings()
        };
        assert_eq!(session_ttl(&forever), Duration::days(400));
        assert_eq!(session_ttl(&settings()), Duration::seconds(600));
    }

    #[test]
    fn test_secure_cookie_flag() {
        let mut response = Response::new(Body::empty());
        let secure = SessionSettings {
            secure: true,
            ..settings()
        };
        set_session_cookie(&mut response, &SessionId::generate(), &secure);

        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.ends_with("; Secure"));
    }
}
