//! GET /__auth/callback

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use std::sync::Arc;

use super::found;
use crate::AppState;
use crate::error::AppError;
use crate::gateway::redirect::safe_redirect;
use crate::ocsf;
use crate::oidc::{CallbackParams, LoginFlow};
use crate::session::middleware::SessionHandle;

/// Complete the OIDC login, run the success hook, and return the visitor to
/// where they started. On any failure no credentials are issued.
pub async fn oauth_callback<F: LoginFlow>(
    State(state): State<Arc<AppState<F>>>,
    session: SessionHandle,
    Query(params): Query<CallbackParams>,
) -> Response {
    let login = match state.login.complete(&session, params).await {
        Ok(login) => login,
        Err(e) => {
            ocsf::oidc_logon_failure(&e.to_string());
            return AppError::from(e).render(&state.page);
        }
    };

    let mut out = HeaderMap::new();
    if let Err(e) = (state.on_success)(&login, &session, &mut out) {
        ocsf::issuance_failure(login.email.as_deref(), None);
        return e.render(&state.page);
    }
    ocsf::oidc_logon_success(login.email.as_deref());

    found(&safe_redirect(&login.return_to, &state.config.base_url), out)
}
