//! Webhook signature check.
//!
//! The platform signs each call as `sha1(concat(sort([token, timestamp,
//! nonce])))` and sends the hex digest in the `signature` query parameter.

use sha1::{Digest, Sha1};

/// Verify a webhook signature against the shared token.
pub fn verify(token: &str, signature: &str, timestamp: &str, nonce: &str) -> bool {
    expected(token, timestamp, nonce) == signature.to_ascii_lowercase()
}

fn expected(token: &str, timestamp: &str, nonce: &str) -> String {
    let mut parts = [token, timestamp, nonce];
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Digests computed independently with `hashlib.sha1` over the sorted
    // concatenation.
    const SIG_A: &str = "14868ea7d291f628c164a0e57f9a7da1bade4e37";
    const SIG_B: &str = "820113569100486ac0b82550ce8fb185b5fccae5";

    #[test]
    fn valid_signature_accepted() {
        assert!(verify("testtoken", SIG_A, "1700000000", "abc123"));
        assert!(verify("your_token", SIG_B, "1234567890", "nonce1"));
    }

    #[test]
    fn uppercase_hex_accepted() {
        assert!(verify("testtoken", &SIG_A.to_ascii_uppercase(), "1700000000", "abc123"));
    }

    #[test]
    fn wrong_token_rejected() {
        assert!(!verify("othertoken", SIG_A, "1700000000", "abc123"));
    }

    #[test]
    fn tampered_parameters_rejected() {
        assert!(!verify("testtoken", SIG_A, "1700000001", "abc123"));
        assert!(!verify("testtoken", SIG_A, "1700000000", "abc124"));
        assert!(!verify("testtoken", "", "1700000000", "abc123"));
    }

    #[test]
    fn digest_is_order_insensitive_in_inputs() {
        // The scheme sorts before hashing, so swapping timestamp and nonce
        // values that sort the same way yields the same digest.
        assert_eq!(
            expected("testtoken", "1700000000", "abc123"),
            expected("abc123", "1700000000", "testtoken")
        );
    }
}
