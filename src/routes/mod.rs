//! HTTP route handlers, mounted under `/__auth`.

pub mod callback;
pub mod login;
pub mod logout;
pub mod unauthorized;

use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// `302 Found` to `location`, carrying any headers already collected
/// (credential cookies, typically).
pub fn found(location: &str, mut headers: HeaderMap) -> Response {
    match HeaderValue::try_from(location) {
        Ok(value) => {
            headers.insert(LOCATION, value);
            (StatusCode::FOUND, headers).into_response()
        }
        Err(_) => AppError::Internal("redirect target is not a valid header value".into())
            .into_response(),
    }
}
