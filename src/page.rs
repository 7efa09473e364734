//! Client-side redirect page served with 401 responses.
//!
//! The template is parsed once at startup. It may only reference
//! `{{redirect_to}}`, which is HTML-escaped on render.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::AUTH_PREFIX;

const BUILTIN_TEMPLATE: &str = include_str!("../templates/redirect.html");
const PLACEHOLDER: &str = "{{redirect_to}}";

/// A parsed redirect page: literal segments between placeholder occurrences.
#[derive(Debug, Clone)]
pub struct RedirectPage {
    segments: Vec<String>,
    login_path: String,
}

impl RedirectPage {
    /// Parse `template`. Unknown `{{...}}` placeholders are rejected so a
    /// typo cannot ship a page with a dead link.
    pub fn parse(template: &str) -> Result<Self, PageError> {
        let segments: Vec<String> = template.split(PLACEHOLDER).map(String::from).collect();
        if segments.len() < 2 {
            return Err(PageError::MissingPlaceholder);
        }
        for segment in &segments {
            if let Some(start) = segment.find("{{") {
                let rest = &segment[start..];
                let end = rest.find("}}").map_or(rest.len(), |i| i + 2);
                return Err(PageError::UnknownPlaceholder(rest[..end].to_string()));
            }
        }
        Ok(Self {
            segments,
            login_path: format!("{AUTH_PREFIX}/redirect"),
        })
    }

    /// The page bundled with the binary.
    pub fn builtin() -> Result<Self, PageError> {
        Self::parse(BUILTIN_TEMPLATE)
    }

    pub fn render(&self, redirect_to: &str) -> String {
        self.segments.join(&escape_html(redirect_to))
    }

    /// 401 page that sends the browser to the login entrypoint.
    pub fn unauthorized_response(&self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            self.render(&self.login_path),
        )
            .into_response()
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("template has no {{{{redirect_to}}}} placeholder")]
    MissingPlaceholder,

    #[error("template references unknown placeholder {0}")]
    UnknownPlaceholder(String),
}
