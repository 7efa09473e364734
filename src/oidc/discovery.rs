//! OIDC provider discovery (`/.well-known/openid-configuration`).

use serde::Deserialize;

use super::OidcError;

/// The subset of provider metadata the login flow uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

/// Fetch provider metadata for `issuer`.
///
/// The advertised issuer must match the configured one, otherwise ID tokens
/// would be validated against the wrong authority.
pub async fn discover(
    http_client: &reqwest::Client,
    issuer: &str,
) -> Result<ProviderMetadata, OidcError> {
    let url = format!(
        "{}/.well-known/openid-configuration",
        issuer.trim_end_matches('/')
    );

    let resp = http_client
        .get(&url)
        .send()
        .await
        .map_err(|e| OidcError::Discovery(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(OidcError::Discovery(format!("HTTP {}", resp.status())));
    }

    let metadata: ProviderMetadata = resp
        .json()
        .await
        .map_err(|e| OidcError::Discovery(e.to_string()))?;

    if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
        return Err(OidcError::Discovery(format!(
            "issuer mismatch: expected {}, got {}",
            issuer, metadata.issuer
        )));
    }

    Ok(metadata)
}
