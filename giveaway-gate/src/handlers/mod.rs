//! HTTP handlers
//!
//! - `GET /` renders the page, and also receives the provider's redirect
//!   (`?code=` or `?error=`), which it handles and then answers with a
//!   redirect back to a clean `/`.
//! - `POST /logout` forgets the logged-in visitor.
//! - `GET /health` reports liveness and the persistence backend.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_htmx::{HxRedirect, HxRequest};
use serde::{Deserialize, Serialize};

use crate::error::GiveawayError;
use crate::oauth2::{complete_login, LoginError};
use crate::session::Session;
use crate::state::AppState;
use crate::template::PageView;

/// Flash message shown after any failed login
pub const LOGIN_FAILED_MESSAGE: &str = "login failed, please retry";

/// Query parameters the provider may append when redirecting back
#[derive(Debug, Default, Deserialize)]
pub struct RedirectParams {
    /// Authorization code
    pub code: Option<String>,
    /// OAuth2 error code, e.g. `access_denied`
    pub error: Option<String>,
    /// Human-readable error detail
    pub error_description: Option<String>,
}

/// Render the page or complete a login
///
/// A given code is exchanged at most once per session: it is marked as used
/// before the exchange starts, so refreshing or replaying the redirect never
/// repeats it.
///
/// # Errors
///
/// Returns error if the page cannot be rendered
pub async fn index(
    State(state): State<AppState>,
    HxRequest(is_htmx): HxRequest,
    session: Session,
    Query(params): Query<RedirectParams>,
) -> Result<Response, GiveawayError> {
    if let Some(error) = params.error {
        report_login_failure(
            &session,
            &LoginError::ConsentDenied {
                error,
                description: params.error_description,
            },
        );
        return Ok(Redirect::to("/").into_response());
    }

    if let Some(code) = params.code.filter(|code| !code.trim().is_empty()) {
        if session.consume_code(&code) {
            match complete_login(state.provider(), state.store(), &code).await {
                Ok(profile) => session.set_profile(profile),
                Err(e) => report_login_failure(&session, &e),
            }
        } else {
            tracing::debug!(session_id = %session.id(), "Authorization code already used, skipping exchange");
        }
        return Ok(Redirect::to("/").into_response());
    }

    let profile = session.profile();
    let view = PageView::new(
        &state.config().content,
        state.provider().authorization_url(),
        profile.as_ref(),
        session.take_flash(),
    );

    Ok(view.render(is_htmx)?.into_response())
}

/// Log out the current visitor
pub async fn logout(HxRequest(is_htmx): HxRequest, session: Session) -> Response {
    if let Some(profile) = session.clear_profile() {
        tracing::info!(subject_id = %profile.subject_id, "User logged out");
    }

    if is_htmx {
        (HxRedirect::from("/"), ()).into_response()
    } else {
        Redirect::to("/").into_response()
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests
    pub status: String,
    /// Active persistence backend, or `disabled`
    pub persistence: String,
}

/// Liveness probe
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        persistence: state
            .store()
            .map_or("disabled", |store| store.backend())
            .to_string(),
    })
}

fn report_login_failure(session: &Session, error: &LoginError) {
    tracing::warn!(
        session_id = %session.id(),
        kind = error.kind(),
        error = %error,
        "Login failed"
    );
    session.set_flash(LOGIN_FAILED_MESSAGE);
}
