//! Application configuration via environment variables.
//!
//! Everything is validated here, once, before the gateway starts serving:
//! a bad signing key or base URL is a startup error, never a per-request one.

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use std::env;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::AUTH_PREFIX;

const DEFAULT_PRESIGN_COOKIE_AGE: &str = "72h";
const DEFAULT_SESSION_COOKIE_NAME: &str = "__auth_session";

/// Where login sessions live between the IdP redirect and the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackendKind {
    /// Session data carried in an HMAC-signed cookie. Works across Lambda instances.
    Cookie,
    /// Server-side `DashMap`, keyed by a signed session id. Single process only.
    Memory,
}

/// RSA key used to sign CloudFront policies.
#[derive(Clone)]
pub struct SigningKey(RsaPrivateKey);

impl SigningKey {
    /// Parse a PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) PEM.
    ///
    /// Literal `\n` sequences are accepted so the key can be passed through a
    /// single-line environment variable.
    pub fn from_pem(pem: &str) -> Result<Self, ConfigError> {
        let pem = pem.trim().replace("\\n", "\n");
        let label = pem
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("-----BEGIN "))
            .and_then(|line| line.strip_suffix("-----"))
            .ok_or_else(|| ConfigError::SigningKey("failed to decode PEM block".into()))?;

        let key = match label {
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_pem(&pem).map_err(|e| {
                ConfigError::SigningKey(format!("failed to parse PKCS1 private key: {e}"))
            })?,
            "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_pem(&pem).map_err(|e| {
                ConfigError::SigningKey(format!("not an RSA PKCS8 private key: {e}"))
            })?,
            other => {
                return Err(ConfigError::SigningKey(format!(
                    "unsupported PEM block type: {other}"
                )));
            }
        };
        Ok(Self(key))
    }

    pub fn as_rsa(&self) -> &RsaPrivateKey {
        &self.0
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub session_secret: Vec<u8>,
    pub base_url: String,
    pub oidc_issuer: String,
    pub allowed_domains: Vec<String>,
    pub presign_cookie_age: Duration,
    pub restrict_path: String,
    pub sign_private_key: SigningKey,
    pub cloudfront_key_pair_id: String,
    pub bypass_ips: Vec<String>,
    pub session_cookie_name: String,
    pub session_backend: SessionBackendKind,
    pub port: u16,
    /// `base_url` joined with `/__auth/callback`; registered with the IdP.
    pub callback_url: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("base_url", &self.base_url)
            .field("oidc_issuer", &self.oidc_issuer)
            .field("allowed_domains", &self.allowed_domains)
            .field("presign_cookie_age", &self.presign_cookie_age)
            .field("restrict_path", &self.restrict_path)
            .field("cloudfront_key_pair_id", &self.cloudfront_key_pair_id)
            .field("bypass_ips", &self.bypass_ips)
            .field("session_cookie_name", &self.session_cookie_name)
            .field("session_backend", &self.session_backend)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `CLIENT_ID`, `CLIENT_SECRET`, `SESSION_SECRET`, `BASE_URL`,
    /// `OIDC_ISSUER`, `RESTRICT_PATH`, `SIGN_PRIVATE_KEY`, `CLOUDFRONT_KEY_PAIR_ID`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnv(key.into()))
        };

        let base_url = required("BASE_URL")?;
        let callback_url = callback_url_for(&base_url)?;

        let session_secret = parse_session_secret(&required("SESSION_SECRET")?)?;

        let presign_cookie_age = parse_duration(
            &lookup("PRESIGN_COOKIE_AGE").unwrap_or_else(|| DEFAULT_PRESIGN_COOKIE_AGE.into()),
        )?;

        let session_backend = match lookup("SESSION_BACKEND").as_deref() {
            None | Some("") | Some("cookie") => SessionBackendKind::Cookie,
            Some("memory") => SessionBackendKind::Memory,
            Some(other) => return Err(ConfigError::InvalidSessionBackend(other.into())),
        };

        Ok(Self {
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            session_secret,
            base_url,
            oidc_issuer: required("OIDC_ISSUER")?,
            allowed_domains: parse_list(lookup("ALLOWED_DOMAINS").as_deref()),
            presign_cookie_age,
            restrict_path: required("RESTRICT_PATH")?,
            sign_private_key: SigningKey::from_pem(&required("SIGN_PRIVATE_KEY")?)?,
            cloudfront_key_pair_id: required("CLOUDFRONT_KEY_PAIR_ID")?,
            bypass_ips: parse_list(lookup("BYPASS_IPS").as_deref()),
            session_cookie_name: lookup("SESSION_COOKIE_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.into()),
            session_backend,
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            callback_url,
        })
    }

    /// Cookies are only marked `Secure` when the gateway is served over HTTPS.
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

/// Configuration for testing; all fields settable directly.
impl Config {
    pub fn test_default(sign_private_key: SigningKey) -> Self {
        Self {
            client_id: "test-client-id".into(),
            client_secret: "test-client-secret".into(),
            session_secret: b"test-session-secret".to_vec(),
            base_url: "https://app.example".into(),
            oidc_issuer: "https://idp.example".into(),
            allowed_domains: Vec::new(),
            presign_cookie_age: Duration::from_secs(72 * 3600),
            restrict_path: "/private".into(),
            sign_private_key,
            cloudfront_key_pair_id: "K2JCJMDEHXQW5F".into(),
            bypass_ips: Vec::new(),
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.into(),
            session_backend: SessionBackendKind::Memory,
            port: 8080,
            callback_url: format!("https://app.example{AUTH_PREFIX}/callback"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid BASE_URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid SESSION_SECRET: {0}")]
    InvalidSessionSecret(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid SIGN_PRIVATE_KEY: {0}")]
    SigningKey(String),

    #[error("invalid SESSION_BACKEND: {0} (expected \"cookie\" or \"memory\")")]
    InvalidSessionBackend(String),
}

fn callback_url_for(base_url: &str) -> Result<String, ConfigError> {
    let mut url = Url::parse(base_url).map_err(|e| ConfigError::InvalidBaseUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }
    url.path_segments_mut()
        .map_err(|_| ConfigError::InvalidBaseUrl("cannot be a base URL".into()))?
        .pop_if_empty()
        .extend(AUTH_PREFIX.trim_start_matches('/').split('/'))
        .push("callback");
    Ok(url.into())
}

fn parse_session_secret(value: &str) -> Result<Vec<u8>, ConfigError> {
    let secret = STANDARD_NO_PAD
        .decode(value.trim().trim_end_matches('='))
        .map_err(|e| ConfigError::InvalidSessionSecret(e.to_string()))?;
    if secret.is_empty() {
        return Err(ConfigError::InvalidSessionSecret("decoded secret is empty".into()));
    }
    Ok(secret)
}

fn parse_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a Go-style duration such as `72h`, `1.5h`, `1h30m` or `45s`.
///
/// Units are `h`, `m`, `s`, `ms`, `us` (or `µs`) and `ns`. Each amount may
/// carry a decimal fraction. Signs are not accepted, and the total must be
/// positive.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(value.to_string());
    let mut rest = value.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let whole_len = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
        let whole = &rest[..whole_len];
        rest = &rest[whole_len..];

        let mut fraction = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let len = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .ok_or_else(invalid)?;
            fraction = &after_dot[..len];
            rest = &after_dot[len..];
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit: u128 = match &rest[..unit_len] {
            "h" => 3_600_000_000_000,
            "m" => 60_000_000_000,
            "s" => 1_000_000_000,
            "ms" => 1_000_000,
            "us" | "µs" => 1_000,
            "ns" => 1,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut part = whole.checked_mul(unit).ok_or_else(invalid)?;
        // Digits past the unit's nanosecond resolution cannot change the result.
        let mut scale = unit;
        for digit in fraction.bytes() {
            scale /= 10;
            if scale == 0 {
                break;
            }
            part += u128::from(digit - b'0') * scale;
        }
        total_nanos = total_nanos.checked_add(part).ok_or_else(invalid)?;
    }

    if total_nanos == 0 {
        return Err(invalid());
    }
    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    // The remainder is below one second, so it fits in u32.
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}
