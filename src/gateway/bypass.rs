//! IP allowlist bypass.
//!
//! The viewer address comes from `CloudFront-Viewer-Address`, which CloudFront
//! sets to `host:port` of the real client. Anything that does not split
//! cleanly into host and port never bypasses.

/// Split `host:port` into its host. IPv6 hosts must be bracketed (`[::1]:443`).
pub fn split_host(address: &str) -> Option<&str> {
    if let Some(rest) = address.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        if host.contains(['[', ']']) || port.contains([':', '[', ']']) {
            return None;
        }
        return Some(host);
    }

    let (host, port) = address.rsplit_once(':')?;
    if host.contains([':', '[', ']']) || port.contains(['[', ']']) {
        return None;
    }
    Some(host)
}

/// `true` iff the viewer's host appears verbatim in `allowlist`.
pub fn is_bypassed(viewer_address: &str, allowlist: &[String]) -> bool {
    match split_host(viewer_address) {
        Some(host) => allowlist.iter().any(|allowed| allowed == host),
        None => false,
    }
}
