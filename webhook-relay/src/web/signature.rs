//! Cyanite webhook signature verification.
//!
//! Cyanite signs the JSON body of each webhook with HMAC-SHA512 using the
//! shared secret and sends the hex digest in the `signature` header.

use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use tracing::warn;

type HmacSha512 = Hmac<Sha512>;

/// Name of the request header carrying the hex digest.
pub const SIGNATURE_HEADER: &str = "signature";

/// Compute the lowercase hex HMAC-SHA512 of `message` keyed by `secret`.
pub fn sign(secret: &str, message: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature.
///
/// # Arguments
///
/// * `secret` - The webhook signing secret
/// * `signature` - Hex digest supplied by the sender
/// * `message` - The serialized body the digest was computed over
///
/// # Returns
///
/// `true` only if `signature` equals the computed digest exactly. The
/// comparison is case-sensitive and covers the full length.
pub fn is_valid(secret: &str, signature: &str, message: &str) -> bool {
    let expected = match sign(secret, message) {
        Ok(digest) => digest,
        Err(_) => {
            warn!("webhook_signature_invalid_key");
            return false;
        }
    };

    let valid = expected == signature;

    if !valid {
        warn!(
            expected_length = expected.len(),
            actual_length = signature.len(),
            "webhook_signature_mismatch"
        );
    }

    valid
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"type":"EVENT","event":{"type":"AudioAnalysisV6","status":"finished"},"resource":{"id":"abc123"}}"#;

    #[test]
    fn test_sign_is_hex_sha512() {
        let digest = sign("s3cr3t", BODY).unwrap();
        assert_eq!(digest.len(), 128);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_sign_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            sign("Jefe", "what do ya want for nothing?").unwrap(),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_is_valid_accepts_own_signature() {
        for (secret, message) in [("s3cr3t", BODY), ("", ""), ("k", "{}"), ("ключ", "ünïcode")] {
            let signature = sign(secret, message).unwrap();
            assert!(is_valid(secret, &signature, message));
        }
    }

    #[test]
    fn test_is_valid_rejects_mutated_message() {
        let signature = sign("s3cr3t", BODY).unwrap();
        let mut bytes = BODY.as_bytes().to_vec();
        for i in 0..bytes.len() {
            let original = bytes[i];
            bytes[i] = if original == b'a' { b'b' } else { b'a' };
            let mutated = String::from_utf8(bytes.clone()).unwrap();
            assert!(!is_valid("s3cr3t", &signature, &mutated), "mutation at {i}");
            bytes[i] = original;
        }
    }

    #[test]
    fn test_is_valid_rejects_mutated_signature() {
        let signature = sign("s3cr3t", BODY).unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        for i in 0..chars.len() {
            let original = chars[i];
            chars[i] = if original == '0' { '1' } else { '0' };
            let mutated: String = chars.iter().collect();
            assert!(!is_valid("s3cr3t", &mutated, BODY), "mutation at {i}");
            chars[i] = original;
        }
    }

    #[test]
    fn test_is_valid_rejects_case_length_and_empty() {
        let signature = sign("s3cr3t", BODY).unwrap();
        assert!(!is_valid("s3cr3t", &signature.to_uppercase(), BODY));
        assert!(!is_valid("s3cr3t", &signature[..64], BODY));
        assert!(!is_valid("s3cr3t", &format!("{signature}0"), BODY));
        assert!(!is_valid("s3cr3t", "", BODY));
        assert!(!is_valid("other", &signature, BODY));
    }
}
