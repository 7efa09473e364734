//! GET /__auth/unauthorized

use axum::extract::State;
use axum::response::Response;
use std::sync::Arc;

use crate::AppState;
use crate::oidc::LoginFlow;

/// 401 page that navigates the browser to the login entrypoint client-side.
pub async fn unauthorized<F: LoginFlow>(State(state): State<Arc<AppState<F>>>) -> Response {
    state.page.unauthorized_response()
}
