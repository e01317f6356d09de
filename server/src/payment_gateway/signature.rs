//! Webhook signatures.
//!
//! The gateway signs the raw request body with HMAC-SHA256 under the shared
//! webhook secret and sends it hex encoded:
//!
//! ```text
//! X-Gateway-Signature: sha256=<hex>
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

const SCHEME: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Signature header value for `body`.
///
/// # Example
///
/// ```
/// use edumarket_server::payment_gateway::signature::{sign, verify};
///
/// let header = sign("whsec", b"{}");
/// assert!(header.starts_with("sha256="));
/// assert!(verify("whsec", b"{}", &header));
/// ```
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = mac(secret);
    mac.update(body);
    format!("{SCHEME}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Check a signature header against `body` in constant time.
#[must_use]
pub fn verify(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(expected) = header.trim().strip_prefix(SCHEME) else {
        return false;
    };
    let Ok(expected) = hex::decode(expected) else {
        return false;
    };
    let mut mac = mac(secret);
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

fn mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never takes the error path.
    HmacSha256::new_from_slice(secret.as_bytes()).unwrap_or_else(|_| unreachable!("HMAC takes any key length"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"event_id":"evt_1"}"#;
        let header = sign("whsec_test", body);
        assert!(verify("whsec_test", body, &header));
    }

    #[test]
    fn test_tampered_body_or_wrong_secret_fails() {
        let header = sign("whsec_test", b"amount=100");
        assert!(!verify("whsec_test", b"amount=999", &header));
        assert!(!verify("other_secret", b"amount=100", &header));
    }

    #[test]
    fn test_malformed_header_fails() {
        assert!(!verify("whsec_test", b"{}", ""));
        assert!(!verify("whsec_test", b"{}", "sha256=not-hex"));
        assert!(!verify("whsec_test", b"{}", &sign("whsec_test", b"{}").replace("sha256=", "md5=")));
    }
}
