//! ID token verification and JWKS cache.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Claims the gateway reads from an ID token.
///
/// `iss`, `aud` and `exp` are checked by `jsonwebtoken` during decode and
/// are not needed afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub nonce: Option<String>,
}

/// JWKS key entry.
#[derive(Debug, Clone, Deserialize)]
pub struct JwkKey {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
    #[serde(default)]
    pub alg: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<JwkKey>,
}

/// Cached JWKS keys with TTL-based expiry.
pub struct JwksCache {
    keys: RwLock<Option<(HashMap<String, DecodingKey>, Instant)>>,
    ttl: Duration,
    http_client: reqwest::Client,
}

impl JwksCache {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            keys: RwLock::new(None),
            ttl: Duration::from_secs(3600),
            http_client,
        }
    }

    /// Fetch or return cached JWKS keys.
    pub async fn get_keys(&self, jwks_url: &str) -> Result<HashMap<String, DecodingKey>, JwtError> {
        {
            let guard = self.keys.read().await;
            if let Some((keys, fetched_at)) = guard.as_ref()
                && fetched_at.elapsed() < self.ttl
            {
                return Ok(keys.clone());
            }
        }

        let resp = self
            .http_client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| JwtError::JwksFetchFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(JwtError::JwksFetchFailed(format!("HTTP {}", resp.status())));
        }

        let jwks: JwksResponse = resp
            .json()
            .await
            .map_err(|e| JwtError::JwksFetchFailed(e.to_string()))?;

        let mut key_map = HashMap::new();
        for key in jwks.keys.iter().filter(|k| k.kty == "RSA") {
            if let Ok(dk) = DecodingKey::from_rsa_components(&key.n, &key.e) {
                key_map.insert(key.kid.clone(), dk);
            }
        }

        let mut guard = self.keys.write().await;
        *guard = Some((key_map.clone(), Instant::now()));

        Ok(key_map)
    }

    /// Drop cached keys so the next lookup refetches.
    pub async fn clear(&self) {
        let mut guard = self.keys.write().await;
        *guard = None;
    }
}

/// Expected values an ID token is checked against.
pub struct Expected<'a> {
    pub issuer: &'a str,
    pub client_id: &'a str,
    pub nonce: &'a str,
}

/// Verify an ID token's RS256 signature, issuer, audience, expiry and nonce.
///
/// An unknown `kid` triggers one JWKS refetch to pick up rotated keys.
pub async fn verify_id_token(
    token: &str,
    jwks_cache: &JwksCache,
    jwks_url: &str,
    expected: &Expected<'_>,
) -> Result<IdTokenClaims, JwtError> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| JwtError::InvalidFormat)?;
    if header.alg != Algorithm::RS256 {
        return Err(JwtError::Validation(format!(
            "unsupported algorithm {:?}",
            header.alg
        )));
    }
    let kid = header.kid.ok_or(JwtError::MissingKid)?;

    let mut keys = jwks_cache.get_keys(jwks_url).await?;
    if !keys.contains_key(&kid) {
        jwks_cache.clear().await;
        keys = jwks_cache.get_keys(jwks_url).await?;
    }
    let decoding_key = keys.get(&kid).ok_or(JwtError::KeyNotFound(kid))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[expected.issuer]);
    validation.set_audience(&[expected.client_id]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    let claims = decode::<IdTokenClaims>(token, decoding_key, &validation)
        .map_err(|e| JwtError::Validation(e.to_string()))?
        .claims;

    if claims.nonce.as_deref() != Some(expected.nonce) {
        return Err(JwtError::NonceMismatch);
    }

    Ok(claims)
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Invalid JWT format")]
    InvalidFormat,

    #[error("Token missing kid header")]
    MissingKid,

    #[error("Signing key not found for kid: {0}")]
    KeyNotFound(String),

    #[error("JWKS fetch failed: {0}")]
    JwksFetchFailed(String),

    #[error("JWT validation failed: {0}")]
    Validation(String),

    #[error("nonce does not match")]
    NonceMismatch,
}
