//! Axum session middleware layer.
//!
//! Extracts the session cookie, loads session data from the backend, makes
//! it available via request extensions, and saves/clears on response.
//!
//! - `SessionHandle`: shared mutable access to session data
//! - Route handlers modify the inner data or call `destroy()`
//! - The middleware checks for changes after the handler returns

use axum::extract::{FromRequestParts, Request};
use axum::http::HeaderValue;
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::{SESSION_MAX_AGE_SECS, SessionBackend, SessionData};
use crate::error::AppError;

/// Shared handle to session state, inserted into request extensions.
#[derive(Clone)]
pub struct SessionHandle {
    pub data: Arc<Mutex<SessionData>>,
    destroyed: Arc<AtomicBool>,
    existing: bool,
}

/// Extract SessionHandle from request extensions (put there by session middleware).
impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or(AppError::Internal(
                "Session middleware not configured".into(),
            ))
    }
}

impl SessionHandle {
    /// A handle over `data`. `existing` records whether the request presented
    /// a valid session cookie.
    pub fn new(data: SessionData, existing: bool) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            destroyed: Arc::new(AtomicBool::new(false)),
            existing,
        }
    }

    /// Mark the session for deletion; the middleware clears the cookie.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Whether the request arrived with a valid session.
    pub fn is_existing(&self) -> bool {
        self.existing
    }
}

/// Session middleware configuration.
pub struct SessionLayer<B: SessionBackend> {
    pub backend: Arc<B>,
    pub cookie_name: String,
    pub https_only: bool,
}

/// Axum middleware function for session handling.
pub async fn session_middleware<B: SessionBackend + 'static>(
    layer: Arc<SessionLayer<B>>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_value = req
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| parse_cookie(h, &layer.cookie_name))
        .map(String::from);

    let loaded = match cookie_value.as_deref() {
        Some(value) => layer.backend.load(value).await,
        None => None,
    };
    // Only a cookie that resolved to a live session counts as existing.
    let cookie_value = cookie_value.filter(|_| loaded.is_some());

    let initial_data = loaded.clone().unwrap_or_default();
    let handle = SessionHandle::new(initial_data.clone(), loaded.is_some());
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;

    if handle.is_destroyed() {
        if let Some(value) = cookie_value.as_deref() {
            layer.backend.delete(value).await;
            let cookie = make_delete_cookie(&layer.cookie_name, layer.https_only);
            append_cookie(&mut response, &cookie);
        }
        return response;
    }

    let current_data = handle.data.lock().await.clone();
    if current_data != initial_data {
        // Only persist when the handler actually modified session data.
        // Otherwise every unauthenticated request would mint a session.
        match layer.backend.save(cookie_value.as_deref(), &current_data).await {
            Ok(value) => {
                let cookie = make_set_cookie(&layer.cookie_name, &value, layer.https_only);
                append_cookie(&mut response, &cookie);
            }
            Err(e) => {
                tracing::error!("Failed to save session: {}", e);
                return AppError::Session(e).into_response();
            }
        }
    }

    response
}

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(_) => tracing::error!("Session cookie is not a valid header value"),
    }
}

fn make_set_cookie(name: &str, value: &str, https_only: bool) -> String {
    let mut parts = vec![
        format!("{name}={value}"),
        format!("Max-Age={SESSION_MAX_AGE_SECS}"),
        "Path=/".into(),
        "HttpOnly".into(),
        "SameSite=Lax".into(),
    ];
    if https_only {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

fn make_delete_cookie(name: &str, https_only: bool) -> String {
    let mut parts = vec![
        format!("{name}="),
        "Max-Age=0".into(),
        "Path=/".into(),
        "HttpOnly".into(),
        "SameSite=Lax".into(),
    ];
    if https_only {
        parts.push("Secure".into());
    }
    parts.join("; ")
}

/// Parse a specific cookie from a Cookie header value.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    for part in header.split(';') {
        let trimmed = part.trim();
        if let Some(value) = trimmed.strip_prefix(name)
            && let Some(value) = value.strip_prefix('=')
        {
            return Some(value);
        }
    }
    None
}
