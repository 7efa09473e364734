//! CloudFront signed-cookie issuance.
//!
//! A credential set is three cookies that CloudFront checks together:
//! the encoded policy, an RSA-SHA1 signature over the policy bytes, and the
//! key-pair id naming the public key to verify with. The signature covers
//! the *unencoded* JSON bytes; encoding happens only after signing.

pub mod encoding;
pub mod policy;

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, SameSite};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};
use std::time::Duration;
use time::OffsetDateTime;
use url::Url;

use crate::config::Config;
use policy::Policy;

pub const COOKIE_NAME_POLICY: &str = "CloudFront-Policy";
pub const COOKIE_NAME_SIGNATURE: &str = "CloudFront-Signature";
pub const COOKIE_NAME_KEY_PAIR_ID: &str = "CloudFront-Key-Pair-Id";

pub const CREDENTIAL_COOKIE_NAMES: [&str; 3] = [
    COOKIE_NAME_POLICY,
    COOKIE_NAME_SIGNATURE,
    COOKIE_NAME_KEY_PAIR_ID,
];

/// Signs CloudFront policies for the configured restricted path.
pub struct Presigner {
    key: RsaPrivateKey,
    key_pair_id: String,
    base_url: String,
    restrict_path: String,
    lifetime: Duration,
}

/// One signed credential set, ready to be written as cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCredentials {
    pub policy: String,
    pub signature: String,
    pub key_pair_id: String,
    pub expires: OffsetDateTime,
}

impl Presigner {
    pub fn new(config: &Config) -> Self {
        Self {
            key: config.sign_private_key.as_rsa().clone(),
            key_pair_id: config.cloudfront_key_pair_id.clone(),
            base_url: config.base_url.clone(),
            restrict_path: config.restrict_path.clone(),
            lifetime: config.presign_cookie_age,
        }
    }

    /// Resource pattern covered by the policy: base URL + restricted path + `/*`.
    ///
    /// The restricted path is joined as already escaped, so `%20` stays `%20`.
    pub fn resource(&self) -> Result<String, PresignError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| PresignError::Resource(e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(PresignError::Resource("base URL cannot be a base".into()));
        }
        let mut path = url.path().trim_end_matches('/').to_string();
        for segment in self.restrict_path.split('/').filter(|s| !s.is_empty()) {
            path.push('/');
            path.push_str(segment);
        }
        path.push_str("/*");
        url.set_path(&path);
        Ok(url.into())
    }

    /// Build and sign a credential set as of `now`. Pure: no cookies are written.
    pub fn sign_at(&self, now: OffsetDateTime) -> Result<SignedCredentials, PresignError> {
        let lifetime = time::Duration::try_from(self.lifetime)
            .map_err(|e| PresignError::Expiry(e.to_string()))?;
        let expires_epoch = now
            .checked_add(lifetime)
            .ok_or_else(|| PresignError::Expiry("lifetime overflows the calendar".into()))?
            .unix_timestamp();
        let expires = OffsetDateTime::from_unix_timestamp(expires_epoch)
            .map_err(|e| PresignError::Expiry(e.to_string()))?;

        let resource = self.resource()?;
        let policy_bytes = Policy::new(resource, expires_epoch).to_canonical_bytes()?;

        let digest = Sha1::digest(&policy_bytes);
        let signature = self
            .key
            .sign_with_rng(&mut rand::thread_rng(), Pkcs1v15Sign::new::<Sha1>(), &digest)
            .map_err(|e| PresignError::Sign(e.to_string()))?;

        Ok(SignedCredentials {
            policy: encoding::encode(&policy_bytes),
            signature: encoding::encode(&signature),
            key_pair_id: self.key_pair_id.clone(),
            expires,
        })
    }

    /// Sign a fresh credential set and append its three `Set-Cookie` headers.
    ///
    /// Either all three cookies are written or none are.
    pub fn issue_credentials(
        &self,
        headers: &mut HeaderMap,
    ) -> Result<SignedCredentials, PresignError> {
        let credentials = self.sign_at(OffsetDateTime::now_utc())?;
        let values = credentials.header_values()?;
        for value in values {
            headers.append(SET_COOKIE, value);
        }
        tracing::debug!(
            expires = credentials.expires.unix_timestamp(),
            key_pair_id = %credentials.key_pair_id,
            "issued CloudFront credentials"
        );
        Ok(credentials)
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// Check a policy/signature cookie pair the way CloudFront does:
    /// decode both, then verify the signature over the decoded policy bytes.
    pub fn verify(&self, policy: &str, signature: &str) -> Result<Policy, PresignError> {
        let policy_bytes = encoding::decode(policy).ok_or(PresignError::Malformed("policy"))?;
        let signature = encoding::decode(signature).ok_or(PresignError::Malformed("signature"))?;
        let digest = Sha1::digest(&policy_bytes);
        self.public_key()
            .verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
            .map_err(|_| PresignError::BadSignature)?;
        Ok(serde_json::from_slice(&policy_bytes)?)
    }
}

impl SignedCredentials {
    /// The three cookies, sharing expiry, path and security attributes.
    pub fn cookies(&self) -> [Cookie<'static>; 3] {
        [
            (COOKIE_NAME_POLICY, self.policy.clone()),
            (COOKIE_NAME_SIGNATURE, self.signature.clone()),
            (COOKIE_NAME_KEY_PAIR_ID, self.key_pair_id.clone()),
        ]
        .map(|(name, value)| {
            Cookie::build((name, value))
                .path("/")
                .expires(self.expires)
                .secure(true)
                .http_only(true)
                .same_site(SameSite::Lax)
                .build()
        })
    }

    fn header_values(&self) -> Result<Vec<HeaderValue>, PresignError> {
        self.cookies()
            .iter()
            .map(|c| HeaderValue::from_str(&c.to_string()).map_err(|_| PresignError::Header))
            .collect()
    }
}

/// Append the expiring form of all three credential cookies.
pub fn clear_credentials(headers: &mut HeaderMap) {
    for name in CREDENTIAL_COOKIE_NAMES {
        let cookie = Cookie::build((name, ""))
            .path("/")
            .max_age(time::Duration::seconds(-1))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .secure(true)
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();
        // Names are constants and the value is empty, so this always encodes.
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            headers.append(SET_COOKIE, value);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PresignError {
    #[error("failed to join resource URL: {0}")]
    Resource(String),

    #[error("failed to compute expiry: {0}")]
    Expiry(String),

    #[error("failed to marshal policy: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to sign policy: {0}")]
    Sign(String),

    #[error("credential cookie is not a valid header value")]
    Header,

    #[error("malformed {0} encoding")]
    Malformed(&'static str),

    #[error("signature does not match policy")]
    BadSignature,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigningKey;

    const PKCS1_PEM: &str = include_str!("../../tests/fixtures/signing_key_pkcs1.pem");

    fn presigner() -> Presigner {
        let key = SigningKey::from_pem(PKCS1_PEM).unwrap();
        Presigner::new(&Config::test_default(key))
    }

    fn presigner_with(base_url: &str, restrict_path: &str) -> Presigner {
        let mut p = presigner();
        p.base_url = base_url.into();
        p.restrict_path = restrict_path.into();
        p
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_resource_join() {
        let cases = [
            ("https://app.example", "/private", "https://app.example/private/*"),
            ("https://app.example/", "private/", "https://app.example/private/*"),
            ("https://app.example/base", "/a/b", "https://app.example/base/a/b/*"),
            ("https://app.example", "/", "https://app.example/*"),
            ("https://app.example", "//a//b/", "https://app.example/a/b/*"),
        ];
        for (base, path, expected) in cases {
            assert_eq!(presigner_with(base, path).resource().unwrap(), expected);
        }
    }

    #[test]
    fn test_resource_keeps_escaped_path() {
        let p = presigner_with("https://app.example", "/my%20files");
        assert_eq!(p.resource().unwrap(), "https://app.example/my%20files/*");

        let p = presigner_with("https://app.example/base%2Fx/", "/a%2Fb");
        assert_eq!(p.resource().unwrap(), "https://app.example/base%2Fx/a%2Fb/*");
    }

    #[test]
    fn test_resource_join_failure() {
        assert!(matches!(
            presigner_with("mailto:ops@example.com", "/private").resource(),
            Err(PresignError::Resource(_))
        ));
        assert!(matches!(
            presigner_with("::not a url::", "/private").resource(),
            Err(PresignError::Resource(_))
        ));
    }

    #[test]
    fn test_expiry_is_now_plus_lifetime() {
        let p = presigner();
        let t1 = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let t2 = OffsetDateTime::from_unix_timestamp(1_700_000_600).unwrap();

        let a = p.sign_at(t1).unwrap();
        let b = p.sign_at(t2).unwrap();

        assert_eq!(a.expires.unix_timestamp(), 1_700_000_000 + 72 * 3600);
        assert_eq!(b.expires.unix_timestamp(), 1_700_000_600 + 72 * 3600);
        assert_ne!(a.expires, b.expires);

        let policy = p.verify(&a.policy, &a.signature).unwrap();
        assert_eq!(
            policy.statement[0].condition.date_less_than.epoch_time,
            a.expires.unix_timestamp()
        );
    }

    #[test]
    fn test_expiry_truncated_to_whole_seconds() {
        let now = OffsetDateTime::from_unix_timestamp_nanos(1_700_000_000_900_000_000).unwrap();
        let creds = presigner().sign_at(now).unwrap();
        assert_eq!(creds.expires.nanosecond(), 0);
        assert_eq!(creds.expires.unix_timestamp(), 1_700_000_000 + 72 * 3600);
    }

    #[test]
    fn test_policy_cookie_decodes_to_single_wildcard_statement() {
        let creds = presigner().sign_at(OffsetDateTime::now_utc()).unwrap();
        let bytes = encoding::decode(&creds.policy).unwrap();
        let policy: Policy = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(policy.statement.len(), 1);
        assert_eq!(policy.statement[0].resource, "https://app.example/private/*");
        assert!(policy.statement[0].resource.ends_with("/*"));
    }

    #[test]
    fn test_signature_verifies_only_exact_policy_bytes() {
        let p = presigner();
        let creds = p.sign_at(OffsetDateTime::now_utc()).unwrap();
        assert!(p.verify(&creds.policy, &creds.signature).is_ok());

        let mut bytes = encoding::decode(&creds.policy).unwrap();
        for i in [0, bytes.len() / 2, bytes.len() - 1] {
            bytes[i] ^= 0x01;
            let tampered = encoding::encode(&bytes);
            assert!(matches!(
                p.verify(&tampered, &creds.signature),
                Err(PresignError::BadSignature)
            ));
            bytes[i] ^= 0x01;
        }
    }

    #[test]
    fn test_reserialized_policy_does_not_verify() {
        let p = presigner();
        let creds = p.sign_at(OffsetDateTime::now_utc()).unwrap();
        let bytes = encoding::decode(&creds.policy).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let pretty = serde_json::to_vec_pretty(&value).unwrap();
        assert!(p.verify(&encoding::encode(&pretty), &creds.signature).is_err());
    }

    #[test]
    fn test_signature_from_other_key_rejected() {
        let p = presigner();
        let other = SigningKey::from_pem(include_str!("../../tests/fixtures/idp_key_pkcs1.pem"))
            .unwrap();
        let mut foreign = presigner();
        foreign.key = other.as_rsa().clone();
        let creds = foreign.sign_at(OffsetDateTime::now_utc()).unwrap();
        assert!(p.verify(&creds.policy, &creds.signature).is_err());
    }

    #[test]
    fn test_issue_writes_three_matching_cookies() {
        let mut headers = HeaderMap::new();
        let creds = presigner().issue_credentials(&mut headers).unwrap();

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 3);

        let parsed: Vec<Cookie<'_>> = cookies
            .iter()
            .map(|c| Cookie::parse(c.as_str()).unwrap())
            .collect();
        let names: Vec<&str> = parsed.iter().map(|c| c.name()).collect();
        assert_eq!(names, CREDENTIAL_COOKIE_NAMES);

        for cookie in &parsed {
            assert_eq!(cookie.path(), Some("/"));
            assert_eq!(cookie.secure(), Some(true));
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.same_site(), Some(SameSite::Lax));
            assert_eq!(cookie.expires_datetime(), Some(creds.expires));
        }
        assert_eq!(parsed[0].value(), creds.policy);
        assert_eq!(parsed[1].value(), creds.signature);
        assert_eq!(parsed[2].value(), "K2JCJMDEHXQW5F");
    }

    #[test]
    fn test_issue_failure_writes_nothing() {
        let mut headers = HeaderMap::new();
        let result =
            presigner_with("mailto:ops@example.com", "/private").issue_credentials(&mut headers);
        assert!(result.is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_issue_rejects_unencodable_key_pair_id() {
        let mut p = presigner();
        p.key_pair_id = "bad\nid".into();
        let mut headers = HeaderMap::new();
        assert!(p.issue_credentials(&mut headers).is_err());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_clear_credentials() {
        let mut headers = HeaderMap::new();
        clear_credentials(&mut headers);
        clear_credentials(&mut headers);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 6);
        for (i, raw) in cookies.iter().enumerate() {
            let cookie = Cookie::parse(raw.as_str()).unwrap();
            assert_eq!(cookie.name(), CREDENTIAL_COOKIE_NAMES[i % 3]);
            assert_eq!(cookie.value(), "");
            assert_eq!(cookie.path(), Some("/"));
            assert!(raw.contains("Max-Age=-1"), "{raw}");
            assert!(cookie.expires_datetime().unwrap() < OffsetDateTime::now_utc());
        }
    }
}
