//! HMAC-SHA256 cookie value signing and verification.
//!
//! Cookie format: `base64url(payload).base64url(hmac_signature)`
//!
//! The payload is opaque here: a session id for the in-memory backend, the
//! serialized session envelope for the cookie backend.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac_for(secret: &[u8], payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC key length is always valid");
    mac.update(payload);
    mac
}

/// Sign a payload, returning the cookie value.
pub fn sign(secret: &[u8], payload: &[u8]) -> String {
    let signature = mac_for(secret, payload).finalize().into_bytes();
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(payload),
        URL_SAFE_NO_PAD.encode(signature)
    )
}

/// Verify a signed cookie value and extract the payload.
///
/// Returns `None` if the signature is invalid or the format is wrong.
pub fn verify(secret: &[u8], cookie_value: &str) -> Option<Vec<u8>> {
    let (payload_part, sig_part) = cookie_value.split_once('.')?;

    let payload = URL_SAFE_NO_PAD.decode(payload_part).ok()?;
    let expected_sig = URL_SAFE_NO_PAD.decode(sig_part).ok()?;

    mac_for(secret, &payload).verify_slice(&expected_sig).ok()?;

    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let secret = b"test-secret-key";
        let cookie = sign(secret, b"abc123-session-id");
        assert_eq!(verify(secret, &cookie), Some(b"abc123-session-id".to_vec()));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let cookie = sign(b"secret-a", b"session-1");
        assert_eq!(verify(b"secret-b", &cookie), None);
    }

    #[test]
    fn test_tampered_payload_fails() {
        let secret = b"my-secret";
        let cookie = sign(secret, b"{\"v\":1}");
        let tampered = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(b"{\"v\":2}"),
            cookie.split_once('.').unwrap().1
        );
        assert_eq!(verify(secret, &tampered), None);
    }

    #[test]
    fn test_tampered_signature_fails() {
        let secret = b"my-secret";
        let cookie = sign(secret, b"payload");
        let (payload_part, _) = cookie.split_once('.').unwrap();
        let tampered = format!("{}.{}", payload_part, URL_SAFE_NO_PAD.encode(b"bad-sig"));
        assert_eq!(verify(secret, &tampered), None);
    }

    #[test]
    fn test_malformed_values() {
        assert_eq!(verify(b"secret", "nodothere"), None);
        assert_eq!(verify(b"secret", "!!!.!!!"), None);
        assert_eq!(verify(b"secret", ""), None);
    }

    #[test]
    fn test_cookie_value_is_cookie_safe() {
        let cookie = sign(b"s", b"any \x00 bytes ; = ,");
        assert_eq!(cookie.matches('.').count(), 1);
        assert!(
            cookie
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        );
    }
}
