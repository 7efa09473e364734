//! OCSF (Open Cybersecurity Schema Framework) structured event logging.
//!
//! Events are emitted via `tracing::info!` on the `ocsf` target as
//! structured JSON. Never panics; serialization errors are dropped.

use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

// OCSF event class UIDs
pub const CLASS_AUTHENTICATION: u32 = 3001;

// Activity IDs
pub const ACTIVITY_LOGON: u32 = 1;
pub const ACTIVITY_LOGOFF: u32 = 2;
pub const ACTIVITY_AUTH_TICKET: u32 = 3; // CloudFront credential issuance

// Status IDs
pub const STATUS_SUCCESS: u32 = 1;
pub const STATUS_FAILURE: u32 = 2;

// Severity IDs
pub const SEVERITY_INFORMATIONAL: u32 = 1;
pub const SEVERITY_LOW: u32 = 2;
pub const SEVERITY_MEDIUM: u32 = 3;
pub const SEVERITY_HIGH: u32 = 4;

// Auth protocol IDs
pub const AUTH_PROTOCOL_UNKNOWN: u32 = 0;
pub const AUTH_PROTOCOL_OAUTH2: u32 = 10;
pub const AUTH_PROTOCOL_OTHER: u32 = 99;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn severity_name(id: u32) -> &'static str {
    match id {
        SEVERITY_INFORMATIONAL => "Informational",
        SEVERITY_LOW => "Low",
        SEVERITY_MEDIUM => "Medium",
        SEVERITY_HIGH => "High",
        5 => "Critical",
        _ => "Unknown",
    }
}

fn status_name(id: u32) -> &'static str {
    match id {
        STATUS_SUCCESS => "Success",
        _ => "Failure",
    }
}

fn emit(event: &serde_json::Value) {
    if let Ok(json) = serde_json::to_string(event) {
        tracing::info!(target: "ocsf", "{}", json);
    }
}

/// Build an OCSF Authentication (3001) event.
#[allow(clippy::too_many_arguments)]
pub fn build_authentication_event(
    activity_id: u32,
    activity_name: &str,
    status_id: u32,
    severity_id: u32,
    user_email: Option<&str>,
    src_endpoint: Option<&str>,
    auth_protocol_id: u32,
    auth_protocol: &str,
    message: &str,
) -> serde_json::Value {
    let mut event = json!({
        "class_uid": CLASS_AUTHENTICATION,
        "class_name": "Authentication",
        "activity_id": activity_id,
        "activity_name": activity_name,
        "severity_id": severity_id,
        "severity": severity_name(severity_id),
        "status_id": status_id,
        "status": status_name(status_id),
        "time": now_millis(),
        "metadata": {
            "product": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "vendor_name": "edge-auth"
            }
        },
        "auth_protocol_id": auth_protocol_id,
        "auth_protocol": auth_protocol,
        "message": message,
    });

    if let Some(email) = user_email {
        event["actor"] = json!({
            "user": {
                "email_addr": email,
                "type_id": 1,
                "type": "User"
            }
        });
    }

    if let Some(address) = src_endpoint {
        event["src_endpoint"] = json!({ "ip": address });
    }

    event
}

/// Emit an OCSF Authentication (3001) event.
#[allow(clippy::too_many_arguments)]
pub fn authentication_event(
    activity_id: u32,
    activity_name: &str,
    status_id: u32,
    severity_id: u32,
    user_email: Option<&str>,
    src_endpoint: Option<&str>,
    auth_protocol_id: u32,
    auth_protocol: &str,
    message: &str,
) {
    emit(&build_authentication_event(
        activity_id,
        activity_name,
        status_id,
        severity_id,
        user_email,
        src_endpoint,
        auth_protocol_id,
        auth_protocol,
        message,
    ));
}

/// A trusted viewer skipped interactive login.
pub fn bypass_logon(viewer: &str) {
    authentication_event(
        ACTIVITY_LOGON,
        "Logon",
        STATUS_SUCCESS,
        SEVERITY_INFORMATIONAL,
        None,
        Some(viewer),
        AUTH_PROTOCOL_OTHER,
        "IP allowlist",
        "Viewer address on bypass allowlist; credentials issued",
    );
}

pub fn oidc_logon_success(email: Option<&str>) {
    authentication_event(
        ACTIVITY_LOGON,
        "Logon",
        STATUS_SUCCESS,
        SEVERITY_INFORMATIONAL,
        email,
        None,
        AUTH_PROTOCOL_OAUTH2,
        "OAuth 2.0/OIDC",
        "OIDC login completed; credentials issued",
    );
}

pub fn oidc_logon_failure(reason: &str) {
    authentication_event(
        ACTIVITY_LOGON,
        "Logon",
        STATUS_FAILURE,
        SEVERITY_MEDIUM,
        None,
        None,
        AUTH_PROTOCOL_OAUTH2,
        "OAuth 2.0/OIDC",
        &format!("OIDC login failed: {reason}"),
    );
}

pub fn logoff() {
    authentication_event(
        ACTIVITY_LOGOFF,
        "Logoff",
        STATUS_SUCCESS,
        SEVERITY_INFORMATIONAL,
        None,
        None,
        AUTH_PROTOCOL_UNKNOWN,
        "Unknown",
        "Credential cookies cleared",
    );
}

/// Signing failed after the visitor was authenticated.
pub fn issuance_failure(email: Option<&str>, src_endpoint: Option<&str>) {
    authentication_event(
        ACTIVITY_AUTH_TICKET,
        "Authentication Ticket",
        STATUS_FAILURE,
        SEVERITY_HIGH,
        email,
        src_endpoint,
        AUTH_PROTOCOL_UNKNOWN,
        "Unknown",
        "CloudFront credential issuance failed",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shape() {
        let event = build_authentication_event(
            ACTIVITY_LOGON,
            "Logon",
            STATUS_FAILURE,
            SEVERITY_MEDIUM,
            Some("alice@example.com"),
            Some("203.0.113.9:443"),
            AUTH_PROTOCOL_OAUTH2,
            "OAuth 2.0/OIDC",
            "OIDC login failed: state parameter does not match",
        );

        assert_eq!(event["class_uid"], 3001);
        assert_eq!(event["activity_id"], 1);
        assert_eq!(event["status"], "Failure");
        assert_eq!(event["severity"], "Medium");
        assert_eq!(event["actor"]["user"]["email_addr"], "alice@example.com");
        assert_eq!(event["src_endpoint"]["ip"], "203.0.113.9:443");
        assert_eq!(event["metadata"]["product"]["name"], "edge-auth-gateway");
    }

    #[test]
    fn test_event_without_actor() {
        let event = build_authentication_event(
            ACTIVITY_LOGOFF,
            "Logoff",
            STATUS_SUCCESS,
            SEVERITY_INFORMATIONAL,
            None,
            None,
            AUTH_PROTOCOL_UNKNOWN,
            "Unknown",
            "Credential cookies cleared",
        );
        assert!(event.get("actor").is_none());
        assert!(event.get("src_endpoint").is_none());
        assert_eq!(event["status"], "Success");
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(severity_name(SEVERITY_HIGH), "High");
        assert_eq!(severity_name(42), "Unknown");
    }
}
