//! Application error types with Axum response mapping.
//!
//! Authentication failures send the visitor back towards login; server-side
//! failures return a generic 500. Details only ever go to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::oidc::OidcError;
use crate::page::RedirectPage;
use crate::presign::PresignError;
use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Login failed: {0}")]
    LoginFailed(#[from] OidcError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Credential signing failed: {0}")]
    Presign(#[from] PresignError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn is_auth_failure(&self) -> bool {
        matches!(self, AppError::LoginFailed(_) | AppError::Session(_))
    }

    fn log(&self) {
        if self.is_auth_failure() {
            tracing::warn!(error = %self, "Request not authenticated");
        } else {
            tracing::error!(error = %self, "Request failed");
        }
    }

    /// Render with the redirect page, so authentication failures leave the
    /// browser a way back to login.
    pub fn render(self, page: &RedirectPage) -> Response {
        if self.is_auth_failure() {
            self.log();
            page.unauthorized_response()
        } else {
            self.into_response()
        }
    }
}

/// Fallback mapping where the redirect page is not at hand.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let (status, body) = if self.is_auth_failure() {
            (StatusCode::UNAUTHORIZED, json!({"error": "Not authenticated"}))
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Internal server error"}),
            )
        };

        (status, axum::Json(body)).into_response()
    }
}
