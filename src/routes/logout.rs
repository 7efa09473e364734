//! GET /__auth/logout

use axum::Json;
use axum::http::HeaderMap;
use serde::Serialize;

use crate::ocsf;
use crate::presign::clear_credentials;
use crate::session::middleware::SessionHandle;

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Clear the credential cookies. Always succeeds, whatever the visitor's state.
pub async fn logout(session: SessionHandle) -> (HeaderMap, Json<LogoutResponse>) {
    let mut headers = HeaderMap::new();
    clear_credentials(&mut headers);
    if session.is_existing() {
        session.destroy();
    }

    ocsf::logoff();

    (headers, Json(LogoutResponse { success: true }))
}
