//! Shared HMAC-SHA256 webhook signature verification.
//!
//! Providers sign callbacks with an HMAC over the raw request body using a
//! shared secret, sent as a hex digest in a signature header (optionally
//! prefixed with `sha256=`). Verification runs over the exact payload bytes
//! as received; parsing and re-serializing first would break on
//! canonicalization differences.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 digest of `body` under `secret`.
#[must_use]
pub fn compute_hmac(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a signature header against the raw payload bytes.
///
/// Accepts the digest with or without a `sha256=` prefix. The comparison is
/// constant-time so the check does not leak digest prefixes.
#[must_use]
pub fn verify_hmac(secret: &str, raw_payload: &[u8], signature_header: &str) -> bool {
    let presented = signature_header
        .strip_prefix("sha256=")
        .unwrap_or(signature_header);

    let Ok(presented) = hex::decode(presented) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(raw_payload);
    let expected = mac.finalize().into_bytes();

    expected.ct_eq(presented.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_verifies() {
        let body = br#"{"event":"delivered","id":"evt-1"}"#;
        let signature = compute_hmac("secret", body);
        assert!(verify_hmac("secret", body, &signature));
    }

    #[test]
    fn sha256_prefix_accepted() {
        let body = b"payload";
        let signature = format!("sha256={}", compute_hmac("secret", body));
        assert!(verify_hmac("secret", body, &signature));
    }

    #[test]
    fn wrong_secret_rejected() {
        let body = b"payload";
        let signature = compute_hmac("secret", body);
        assert!(!verify_hmac("other", body, &signature));
    }

    #[test]
    fn tampered_payload_rejected() {
        let signature = compute_hmac("secret", b"payload");
        assert!(!verify_hmac("secret", b"payload2", &signature));
    }

    #[test]
    fn malformed_hex_rejected() {
        assert!(!verify_hmac("secret", b"payload", "not-hex!"));
    }

    #[test]
    fn verification_uses_exact_bytes() {
        // Same JSON value, different byte representation: only the exact
        // bytes that were signed verify.
        let compact = br#"{"a":1}"#;
        let spaced = br#"{"a": 1}"#;
        let signature = compute_hmac("secret", compact);
        assert!(verify_hmac("secret", compact, &signature));
        assert!(!verify_hmac("secret", spaced, &signature));
    }
}
