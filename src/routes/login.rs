//! GET /__auth/redirect

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use super::found;
use crate::AppState;
use crate::error::AppError;
use crate::gateway::{self, LoginDecision};
use crate::ocsf;
use crate::oidc::LoginFlow;
use crate::session::middleware::SessionHandle;

/// Login entrypoint: bypass straight to credentials, or start an OIDC login.
pub async fn login_redirect<F: LoginFlow>(
    State(state): State<Arc<AppState<F>>>,
    headers: HeaderMap,
    session: SessionHandle,
) -> Response {
    match gateway::classify(&headers, &state.config) {
        LoginDecision::Bypass {
            redirect_to,
            viewer,
        } => {
            let mut out = HeaderMap::new();
            if let Err(e) = state.presigner.issue_credentials(&mut out) {
                ocsf::issuance_failure(None, Some(&viewer));
                return AppError::from(e).render(&state.page);
            }
            ocsf::bypass_logon(&viewer);
            found(&redirect_to, out)
        }
        LoginDecision::Interactive { return_to } => {
            match state.login.begin(&session, return_to).await {
                Ok(url) => found(&url, HeaderMap::new()),
                // Not an auth failure: the 401 page would loop straight back here.
                Err(e) => AppError::Internal(e.to_string()).into_response(),
            }
        }
    }
}
