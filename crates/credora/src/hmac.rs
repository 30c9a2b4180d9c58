//! Request signing for self-hosted facilitators that require a shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::CredoraError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex HMAC of the request body.
pub const FACILITATOR_AUTH_HEADER: &str = "X-Facilitator-Auth";

/// Compute HMAC-SHA256 over `body` with `secret`, hex-encoded.
pub fn compute_hmac(secret: &[u8], body: &[u8]) -> Result<String, CredoraError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| CredoraError::ConfigError(format!("invalid HMAC key: {e}")))?;
    mac.update(body);
    Ok(alloy::hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_is_deterministic() {
        let a = compute_hmac(b"secret", b"{\"x402Version\":1}").unwrap();
        let b = compute_hmac(b"secret", b"{\"x402Version\":1}").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_hmac_depends_on_secret_and_body() {
        let base = compute_hmac(b"secret", b"body").unwrap();
        assert_ne!(base, compute_hmac(b"other", b"body").unwrap());
        assert_ne!(base, compute_hmac(b"secret", b"tampered").unwrap());
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2
        assert_eq!(
            compute_hmac(b"Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_accepts_empty_and_long_keys() {
        assert!(compute_hmac(b"", b"body").is_ok());
        assert_eq!(compute_hmac(&[0x42; 200], b"body").unwrap().len(), 64);
    }
}
