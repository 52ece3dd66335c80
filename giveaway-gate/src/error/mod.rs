//! Error types and error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Application error type for handler failures
///
/// Login failures never reach this type: they are reported to the visitor as
/// a flash message on the page. What remains are faults of the server itself.
#[derive(Debug, Error)]
pub enum GiveawayError {
    /// Template rendering failed
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Session layer missing from the router
    #[error("Session not initialized")]
    SessionMissing,
}

impl IntoResponse for GiveawayError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Request failed");

        let message = match self {
            Self::SessionMissing => "Session not initialized",
            Self::Template(_) => "Internal server error",
        };

        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}
