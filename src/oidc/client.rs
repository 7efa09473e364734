//! Authorization-code client against a discovered OIDC provider.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use serde::Deserialize;

use super::discovery::{self, ProviderMetadata};
use super::jwt::{self, Expected, JwksCache};
use super::{
    CallbackParams, CompletedLogin, LoginFlow, OidcError, PendingLogin, check_callback,
    check_domain, store_pending, take_pending,
};
use crate::config::Config;
use crate::session::middleware::SessionHandle;

const SCOPES: &str = "openid email";

/// Token endpoint response. Only the ID token is used.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub id_token: Option<String>,
}

pub struct OidcClient {
    http_client: reqwest::Client,
    metadata: ProviderMetadata,
    jwks_cache: JwksCache,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    allowed_domains: Vec<String>,
}

impl OidcClient {
    /// Discover the provider named by `config.oidc_issuer` and build a client.
    pub async fn discover(
        http_client: reqwest::Client,
        config: &Config,
    ) -> Result<Self, OidcError> {
        let metadata = discovery::discover(&http_client, &config.oidc_issuer).await?;
        tracing::info!(issuer = %metadata.issuer, "OIDC provider discovered");
        Ok(Self::new(http_client, metadata, config))
    }

    pub fn new(http_client: reqwest::Client, metadata: ProviderMetadata, config: &Config) -> Self {
        Self {
            jwks_cache: JwksCache::new(http_client.clone()),
            http_client,
            metadata,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.callback_url.clone(),
            allowed_domains: config.allowed_domains.clone(),
        }
    }

    /// The IdP authorization URL for a login with the given `state` and `nonce`.
    pub fn authorization_url(&self, state: &str, nonce: &str) -> Result<String, OidcError> {
        let mut url = url::Url::parse(&self.metadata.authorization_endpoint)
            .map_err(|e| OidcError::Discovery(format!("authorization_endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", SCOPES)
            .append_pair("state", state)
            .append_pair("nonce", nonce);
        Ok(url.into())
    }

    /// Exchange an authorization code at the token endpoint.
    ///
    /// Client credentials go in the Authorization header (`client_secret_basic`).
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OidcError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let resp = self
            .http_client
            .post(&self.metadata.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| OidcError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(OidcError::TokenExchangeFailed(format!("HTTP {status}: {text}")));
        }

        resp.json()
            .await
            .map_err(|e| OidcError::RequestFailed(e.to_string()))
    }
}

fn random_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

impl LoginFlow for OidcClient {
    async fn begin(&self, session: &SessionHandle, return_to: String) -> Result<String, OidcError> {
        let pending = PendingLogin {
            state: random_token(),
            nonce: random_token(),
            return_to,
        };
        let url = self.authorization_url(&pending.state, &pending.nonce)?;
        store_pending(session, &pending).await?;
        Ok(url)
    }

    async fn complete(
        &self,
        session: &SessionHandle,
        params: CallbackParams,
    ) -> Result<CompletedLogin, OidcError> {
        let pending = take_pending(session).await.ok_or(OidcError::NoPendingLogin)?;
        let code = check_callback(&pending, &params)?;

        let tokens = self.exchange_code(code).await?;
        let id_token = tokens
            .id_token
            .ok_or_else(|| OidcError::TokenExchangeFailed("response has no id_token".into()))?;

        let claims = jwt::verify_id_token(
            &id_token,
            &self.jwks_cache,
            &self.metadata.jwks_uri,
            &Expected {
                issuer: &self.metadata.issuer,
                client_id: &self.client_id,
                nonce: &pending.nonce,
            },
        )
        .await?;

        if !self.allowed_domains.is_empty() && claims.email_verified == Some(false) {
            return Err(OidcError::DomainNotAllowed("email not verified".into()));
        }
        check_domain(claims.email.as_deref(), &self.allowed_domains)?;

        Ok(CompletedLogin {
            subject: claims.sub,
            email: claims.email,
            return_to: pending.return_to,
        })
    }
}
