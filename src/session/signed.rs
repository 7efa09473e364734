//! Stateless session backend: the session data lives in the cookie itself.
//!
//! The cookie value is the HMAC-signed JSON envelope `{"iat": <secs>, "data": {...}}`.
//! Nothing is stored server-side, so any gateway instance can complete a
//! login that another instance started.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::cookie::{sign, verify};
use super::{SESSION_MAX_AGE_SECS, SessionBackend, SessionData, SessionError};

/// Browsers drop cookies above ~4 KiB; refuse to emit one that would be lost.
const MAX_COOKIE_VALUE_LEN: usize = 3800;

#[derive(Serialize, Deserialize)]
struct Envelope {
    iat: u64,
    data: SessionData,
}

pub struct SignedCookieBackend {
    secret: Vec<u8>,
    max_age_secs: u64,
}

impl SignedCookieBackend {
    pub fn new(secret: Vec<u8>) -> Self {
        Self::with_max_age(secret, SESSION_MAX_AGE_SECS)
    }

    pub fn with_max_age(secret: Vec<u8>, max_age_secs: u64) -> Self {
        Self {
            secret,
            max_age_secs,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl SessionBackend for SignedCookieBackend {
    async fn load(&self, cookie_value: &str) -> Option<SessionData> {
        let payload = verify(&self.secret, cookie_value)?;
        let envelope: Envelope = serde_json::from_slice(&payload).ok()?;
        if now_secs().saturating_sub(envelope.iat) > self.max_age_secs {
            return None;
        }
        Some(envelope.data)
    }

    async fn save(
        &self,
        _cookie_value: Option<&str>,
        data: &SessionData,
    ) -> Result<String, SessionError> {
        let envelope = Envelope {
            iat: now_secs(),
            data: data.clone(),
        };
        let value = sign(&self.secret, &serde_json::to_vec(&envelope)?);
        if value.len() > MAX_COOKIE_VALUE_LEN {
            return Err(SessionError::TooLarge(MAX_COOKIE_VALUE_LEN));
        }
        Ok(value)
    }

    async fn delete(&self, _cookie_value: &str) {}
}
