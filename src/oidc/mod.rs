//! OpenID Connect login flow.
//!
//! The gateway only needs two capabilities from the identity provider:
//! start a login (a URL to send the browser to) and complete it (turn the
//! callback parameters into a verified identity). [`LoginFlow`] is that
//! seam; [`OidcClient`] is the authorization-code implementation.

pub mod client;
pub mod discovery;
pub mod jwt;

pub use client::OidcClient;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::session::middleware::SessionHandle;

/// Session key holding the in-flight [`PendingLogin`].
pub const PENDING_LOGIN_KEY: &str = "oidc_pending";

/// What the gateway remembers between the IdP redirect and the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub state: String,
    pub nonce: String,
    /// Already sanitized; always starts with `/`.
    pub return_to: String,
}

/// Query parameters from the IdP redirect back to `/__auth/callback`.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A successfully completed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedLogin {
    pub subject: String,
    pub email: Option<String>,
    pub return_to: String,
}

/// Login capability set required by the gateway.
pub trait LoginFlow: Send + Sync {
    /// Record a pending login in the session and return the IdP URL to redirect to.
    fn begin(
        &self,
        session: &SessionHandle,
        return_to: String,
    ) -> impl std::future::Future<Output = Result<String, OidcError>> + Send;

    /// Validate the callback against the pending login and verify the identity.
    fn complete(
        &self,
        session: &SessionHandle,
        params: CallbackParams,
    ) -> impl std::future::Future<Output = Result<CompletedLogin, OidcError>> + Send;
}

/// Store the pending login in the session, replacing any earlier one.
pub async fn store_pending(
    session: &SessionHandle,
    pending: &PendingLogin,
) -> Result<(), OidcError> {
    let value = serde_json::to_value(pending).map_err(|e| OidcError::Internal(e.to_string()))?;
    session.data.lock().await.set(PENDING_LOGIN_KEY, value);
    Ok(())
}

/// Remove and return the pending login. A pending login is single-use.
pub async fn take_pending(session: &SessionHandle) -> Option<PendingLogin> {
    let value = session.data.lock().await.remove(PENDING_LOGIN_KEY)?;
    serde_json::from_value(value).ok()
}

/// Check the callback parameters against the pending login and return the code.
pub fn check_callback<'a>(
    pending: &PendingLogin,
    params: &'a CallbackParams,
) -> Result<&'a str, OidcError> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or(error);
        return Err(OidcError::Provider(description.to_string()));
    }

    let state = params.state.as_deref().unwrap_or_default();
    if state.is_empty() || !bool::from(state.as_bytes().ct_eq(pending.state.as_bytes())) {
        return Err(OidcError::StateMismatch);
    }

    match params.code.as_deref() {
        Some(code) if !code.is_empty() => Ok(code),
        _ => Err(OidcError::MissingCode),
    }
}

/// Enforce the e-mail domain allowlist. An empty list allows everyone.
pub fn check_domain(email: Option<&str>, allowed_domains: &[String]) -> Result<(), OidcError> {
    if allowed_domains.is_empty() {
        return Ok(());
    }
    let domain = email
        .and_then(|e| e.rsplit_once('@'))
        .map(|(_, domain)| domain)
        .ok_or_else(|| OidcError::DomainNotAllowed("no email claim".into()))?;
    if allowed_domains.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
        Ok(())
    } else {
        Err(OidcError::DomainNotAllowed(domain.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("OIDC discovery failed: {0}")]
    Discovery(String),

    #[error("identity provider returned an error: {0}")]
    Provider(String),

    #[error("no login in progress for this session")]
    NoPendingLogin,

    #[error("state parameter does not match")]
    StateMismatch,

    #[error("missing authorization code")]
    MissingCode,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("ID token rejected: {0}")]
    IdToken(#[from] jwt::JwtError),

    #[error("email domain not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("internal error: {0}")]
    Internal(String),
}
