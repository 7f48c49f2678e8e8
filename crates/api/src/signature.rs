//! Webhook signature verification.
//!
//! Requests carry an `X-Signature` header holding the hex HMAC-SHA256 digest
//! of the exact raw request body. Verification happens before the body is
//! parsed, and fails closed when no secret is configured.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    /// No secret configured on this deployment; nothing can be verified.
    NotConfigured,
    /// The signature header was absent.
    Missing,
    /// The header was present but did not match the body.
    Invalid,
}

/// Verifies webhook payloads against a shared secret.
#[derive(Debug, Clone)]
pub struct WebhookVerifier {
    secret: Option<Vec<u8>>,
}

impl WebhookVerifier {
    /// An empty secret counts as unset.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(String::into_bytes),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("WEBHOOK_SECRET").ok())
    }

    /// Check `header` against the digest of `body`.
    ///
    /// The comparison is constant-time, so a near-miss leaks nothing about
    /// how many bytes matched.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let Some(secret) = &self.secret else {
            return Err(SignatureError::NotConfigured);
        };
        let Some(header) = header else {
            return Err(SignatureError::Missing);
        };
        let provided = hex::decode(header.trim()).map_err(|_| SignatureError::Invalid)?;

        // HMAC accepts keys of any length; new_from_slice cannot fail here.
        let mut mac =
            HmacSha256::new_from_slice(secret).map_err(|_| SignatureError::NotConfigured)?;
        mac.update(body);
        mac.verify_slice(&provided)
            .map_err(|_| SignatureError::Invalid)
    }

    /// Hex digest for `body` under the configured secret. Used by tests and
    /// as the reference for webhook senders.
    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret).ok()?;
        mac.update(body);
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(Some("test-secret".to_string()))
    }

    #[test]
    fn valid_signature_passes() {
        let v = verifier();
        let body = br#"{"event_id":"evt_1"}"#;
        let sig = v.sign(body).unwrap();
        assert_eq!(v.verify(body, Some(&sig)), Ok(()));
    }

    #[test]
    fn signature_is_bound_to_the_exact_body() {
        let v = verifier();
        let sig = v.sign(b"original").unwrap();
        assert_eq!(v.verify(b"tampered", Some(&sig)), Err(SignatureError::Invalid));
    }

    #[test]
    fn missing_header_is_rejected() {
        assert_eq!(verifier().verify(b"x", None), Err(SignatureError::Missing));
    }

    #[test]
    fn garbage_header_is_invalid_not_a_panic() {
        let v = verifier();
        assert_eq!(v.verify(b"x", Some("not-hex")), Err(SignatureError::Invalid));
        assert_eq!(v.verify(b"x", Some("")), Err(SignatureError::Invalid));
    }

    #[test]
    fn unset_or_empty_secret_fails_closed() {
        let unset = WebhookVerifier::new(None);
        assert_eq!(unset.verify(b"x", Some("00")), Err(SignatureError::NotConfigured));
        assert!(unset.sign(b"x").is_none());

        let empty = WebhookVerifier::new(Some(String::new()));
        assert_eq!(empty.verify(b"x", Some("00")), Err(SignatureError::NotConfigured));
    }

    #[test]
    fn different_secrets_disagree() {
        let a = WebhookVerifier::new(Some("a".to_string()));
        let b = WebhookVerifier::new(Some("b".to_string()));
        let sig = a.sign(b"body").unwrap();
        assert_eq!(b.verify(b"body", Some(&sig)), Err(SignatureError::Invalid));
    }
}
