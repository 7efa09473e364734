//! In-memory session backend for development and testing.
//!
//! Uses `DashMap` for concurrent access without external locks. The cookie
//! carries an HMAC-signed random session id.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use rand::Rng;
use std::time::{Duration, Instant};

use super::cookie::{sign, verify};
use super::{SESSION_MAX_AGE_SECS, SessionBackend, SessionData, SessionError};

/// In-memory session store.
///
/// Not suitable for Lambda: sessions are lost on restart and not shared
/// across instances. Use the signed-cookie backend there.
pub struct InMemoryBackend {
    store: DashMap<String, (SessionData, Instant)>,
    secret: Vec<u8>,
    max_age: Duration,
}

impl InMemoryBackend {
    pub fn new(secret: Vec<u8>) -> Self {
        Self::with_max_age(secret, Duration::from_secs(SESSION_MAX_AGE_SECS))
    }

    pub fn with_max_age(secret: Vec<u8>, max_age: Duration) -> Self {
        Self {
            store: DashMap::new(),
            secret,
            max_age,
        }
    }

    /// Number of sessions currently stored (including expired).
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn session_id(&self, cookie_value: &str) -> Option<String> {
        String::from_utf8(verify(&self.secret, cookie_value)?).ok()
    }
}

fn generate_session_id() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

impl SessionBackend for InMemoryBackend {
    async fn load(&self, cookie_value: &str) -> Option<SessionData> {
        let session_id = self.session_id(cookie_value)?;
        let entry = self.store.get(&session_id)?;
        let (data, created) = entry.value();

        if created.elapsed() > self.max_age {
            drop(entry); // Release the read lock before removing
            self.store.remove(&session_id);
            return None;
        }

        Some(data.clone())
    }

    async fn save(
        &self,
        cookie_value: Option<&str>,
        data: &SessionData,
    ) -> Result<String, SessionError> {
        // Abandoned logins are never loaded again, so expire them here.
        self.store.retain(|_, (_, created)| created.elapsed() <= self.max_age);

        let session_id = cookie_value
            .and_then(|v| self.session_id(v))
            .unwrap_or_else(generate_session_id);

        let created = self
            .store
            .get(&session_id)
            .map(|e| e.value().1)
            .unwrap_or_else(Instant::now);

        self.store.insert(session_id.clone(), (data.clone(), created));
        Ok(sign(&self.secret, session_id.as_bytes()))
    }

    async fn delete(&self, cookie_value: &str) {
        if let Some(session_id) = self.session_id(cookie_value) {
            self.store.remove(&session_id);
        }
    }
}
