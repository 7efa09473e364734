//! Authorization decisions for the login entrypoint and the post-login hook.
//!
//! The route handlers stay thin: they ask [`classify`] what to do with a
//! login request and call the injected [`SuccessHook`] after a completed
//! OIDC login.

pub mod bypass;
pub mod redirect;

use axum::http::HeaderMap;
use axum::http::header::REFERER;
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::oidc::CompletedLogin;
use crate::presign::Presigner;
use crate::session::middleware::SessionHandle;

/// Header set by CloudFront with the real viewer `ip:port`.
pub const VIEWER_ADDRESS_HEADER: &str = "cloudfront-viewer-address";

/// What to do with a request to the login entrypoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginDecision {
    /// Trusted address: issue credentials and go straight back.
    Bypass { redirect_to: String, viewer: String },
    /// Start an interactive login that returns to `return_to`.
    Interactive { return_to: String },
}

/// Classify a login request from its headers.
pub fn classify(headers: &HeaderMap, config: &Config) -> LoginDecision {
    let referrer = header_str(headers, REFERER.as_str());
    let target = redirect::safe_redirect(referrer, &config.base_url);
    let viewer = header_str(headers, VIEWER_ADDRESS_HEADER);

    if bypass::is_bypassed(viewer, &config.bypass_ips) {
        LoginDecision::Bypass {
            redirect_to: target,
            viewer: viewer.to_string(),
        }
    } else {
        LoginDecision::Interactive { return_to: target }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Called once after a login completes, before the redirect to `return_to`.
///
/// May add headers to the redirect response. An error aborts the redirect.
pub type SuccessHook = Arc<
    dyn Fn(&CompletedLogin, &SessionHandle, &mut HeaderMap) -> Result<(), AppError> + Send + Sync,
>;

/// The production hook: issue CloudFront credentials, then drop the login
/// session, which has served its purpose.
pub fn presign_on_success(presigner: Arc<Presigner>) -> SuccessHook {
    Arc::new(
        move |login: &CompletedLogin,
              session: &SessionHandle,
              headers: &mut HeaderMap|
              -> Result<(), AppError> {
            presigner.issue_credentials(headers)?;
            session.destroy();
            tracing::debug!(
                subject = %login.subject,
                "Login session closed after credential issuance"
            );
            Ok(())
        },
    )
}
