//! CloudFront's URL-safe base64 variant.
//!
//! Standard base64 with `+` → `-`, `=` → `_`, `/` → `~`. Padding is kept
//! (as `_`), which is what the CloudFront verifier expects for both the
//! policy and the signature.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Encode bytes for a `CloudFront-Policy` or `CloudFront-Signature` cookie.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '=' => '_',
            '/' => '~',
            other => other,
        })
        .collect()
}

/// Reverse of [`encode`]. Returns `None` for input that is not valid in the variant.
pub fn decode(value: &str) -> Option<Vec<u8>> {
    if value.contains(['+', '=', '/']) {
        return None;
    }
    let standard: String = value
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '=',
            '~' => '/',
            other => other,
        })
        .collect();
    STANDARD.decode(standard).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_all_three_characters() {
        // 0xfb 0xff encodes to "+/8=" in standard base64
        assert_eq!(STANDARD.encode([0xfb, 0xff]), "+/8=");
        assert_eq!(encode(&[0xfb, 0xff]), "-~8_");
    }

    #[test]
    fn test_alphanumerics_preserved() {
        assert_eq!(encode(b"hello"), "aGVsbG8_");
        assert_eq!(encode(b"abc"), "YWJj");
    }

    #[test]
    fn test_output_has_no_reserved_characters() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = encode(&bytes);
        assert!(!encoded.contains(['+', '=', '/']));
        assert_eq!(decode(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_decode_rejects_standard_alphabet() {
        assert!(decode("+/8=").is_none());
        assert!(decode("not base64!").is_none());
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode(b""), "");
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }
}
