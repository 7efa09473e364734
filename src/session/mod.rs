//! Login session management.
//!
//! A session only has to survive the round-trip to the identity provider:
//! it holds the pending login (state, nonce, return target) and is destroyed
//! once the callback succeeds. Two backends are provided, selected by
//! `SESSION_BACKEND`: a stateless signed cookie (default) and an in-memory map.

pub mod cookie;
pub mod memory;
pub mod middleware;
pub mod signed;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifetime of a login session, both server-side and in the browser.
pub const SESSION_MAX_AGE_SECS: u64 = 3600;

/// Session data stored per visitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionData {
    #[serde(flatten)]
    pub data: HashMap<String, serde_json::Value>,
}

impl SessionData {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pluggable session storage backend.
///
/// A backend maps the session cookie value to session data. What the value
/// contains (a signed id, or the signed data itself) is up to the backend.
pub trait SessionBackend: Send + Sync {
    /// Resolve a cookie value. Returns `None` if unknown, tampered or expired.
    fn load(
        &self,
        cookie_value: &str,
    ) -> impl std::future::Future<Output = Option<SessionData>> + Send;

    /// Persist session data, returning the cookie value that refers to it.
    ///
    /// `cookie_value` is the value the request arrived with, if it was valid.
    fn save(
        &self,
        cookie_value: Option<&str>,
        data: &SessionData,
    ) -> impl std::future::Future<Output = Result<String, SessionError>> + Send;

    /// Forget the session behind a cookie value.
    fn delete(&self, cookie_value: &str) -> impl std::future::Future<Output = ()> + Send;
}

/// Type-erased session backend.
///
/// Since `SessionBackend` uses RPITIT, it's not object-safe. This enum
/// dispatches manually instead.
pub enum AnyBackend {
    Cookie(signed::SignedCookieBackend),
    Memory(memory::InMemoryBackend),
}

impl SessionBackend for AnyBackend {
    async fn load(&self, cookie_value: &str) -> Option<SessionData> {
        match self {
            AnyBackend::Cookie(b) => b.load(cookie_value).await,
            AnyBackend::Memory(b) => b.load(cookie_value).await,
        }
    }

    async fn save(
        &self,
        cookie_value: Option<&str>,
        data: &SessionData,
    ) -> Result<String, SessionError> {
        match self {
            AnyBackend::Cookie(b) => b.save(cookie_value, data).await,
            AnyBackend::Memory(b) => b.save(cookie_value, data).await,
        }
    }

    async fn delete(&self, cookie_value: &str) {
        match self {
            AnyBackend::Cookie(b) => b.delete(cookie_value).await,
            AnyBackend::Memory(b) => b.delete(cookie_value).await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("session cookie exceeds {0} bytes")]
    TooLarge(usize),
}
