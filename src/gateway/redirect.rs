//! Post-login redirect target sanitizing.
//!
//! The `Referer` header is attacker-controlled, so it is only honored when it
//! is root-relative or points under our own base URL. Everything else
//! collapses to `/`. The result always starts with a single `/` and never
//! contains control characters, which browsers strip before resolving.

/// Compute a same-origin redirect target from a referrer.
pub fn safe_redirect(referrer: &str, base_url: &str) -> String {
    if referrer.is_empty() || referrer.chars().any(|c| c.is_ascii_control()) {
        return "/".into();
    }

    if referrer.starts_with('/') {
        return root_relative(referrer);
    }

    if !base_url.is_empty()
        && let Some(rest) = referrer.strip_prefix(base_url)
    {
        if rest.is_empty() {
            return "/".into();
        }
        if rest.starts_with('/') {
            return root_relative(rest);
        }
        return root_relative(&format!("/{rest}"));
    }

    "/".into()
}

/// Reject protocol-relative (`//host`) and backslash variants browsers treat alike.
fn root_relative(path: &str) -> String {
    if path.starts_with("//") || path.starts_with("/\\") {
        return "/".into();
    }
    path.to_string()
}
