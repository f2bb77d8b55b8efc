//! Webhook signature verification.
//!
//! The identity provider signs deliveries with the Svix scheme: the signed
//! content is `{msg_id}.{timestamp}.{body}`, the key is the base64 payload of
//! the `whsec_…` endpoint secret, and the `webhook-signature` header carries
//! one or more space-separated `v1,<base64>` entries.
//!
//! Uses pure Rust crates (hmac + sha2), no provider SDK.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::ServiceError;

/// Signature scheme version accepted in the signature header.
const SIGNATURE_VERSION: &str = "v1";

/// Maximum allowed clock skew between delivery and verification.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 5 * 60;

/// Prefix carried by endpoint secrets as displayed in the provider dashboard.
const SECRET_PREFIX: &str = "whsec_";

/// Decode an endpoint secret into raw key bytes.
///
/// Accepts both the dashboard form (`whsec_<base64>`) and a bare base64
/// string.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, ServiceError> {
    let b64 = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
    STANDARD
        .decode(b64)
        .map_err(|_| ServiceError::Internal("webhook secret is not valid base64".into()))
}

/// Compute the `v1,<base64>` signature for a delivery.
pub fn sign(key: &[u8], msg_id: &str, timestamp: i64, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(msg_id.as_bytes());
    mac.update(b".");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    format!(
        "{SIGNATURE_VERSION},{}",
        STANDARD.encode(mac.finalize().into_bytes())
    )
}

/// Verify a webhook delivery.
///
/// `signature_header` may contain several space-separated signatures (the
/// provider sends one per active secret during secret rotation); any match
/// passes. Comparison is constant-time.
pub fn verify(
    secret: &str,
    msg_id: &str,
    timestamp_header: &str,
    signature_header: &str,
    body: &[u8],
    now_unix: i64,
) -> Result<(), ServiceError> {
    let timestamp: i64 = timestamp_header
        .parse()
        .map_err(|_| ServiceError::Unauthorized("invalid webhook timestamp".into()))?;

    if (now_unix - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(ServiceError::Unauthorized(
            "webhook timestamp outside tolerance".into(),
        ));
    }

    let key = decode_secret(secret)?;
    let expected = sign(&key, msg_id, timestamp, body);
    let expected_b64 = expected
        .split_once(',')
        .map(|(_, sig)| sig)
        .unwrap_or_default();

    for candidate in signature_header.split_ascii_whitespace() {
        let Some((version, sig)) = candidate.split_once(',') else {
            continue;
        };
        if version != SIGNATURE_VERSION {
            continue;
        }
        if ct_eq(sig.as_bytes(), expected_b64.as_bytes()) {
            return Ok(());
        }
    }

    Err(ServiceError::Unauthorized(
        "webhook signature mismatch".into(),
    ))
}

// ── Internal ────────────────────────────────────────────────────────────────

/// Constant-time byte comparison.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

    fn signed(body: &[u8], msg_id: &str, ts: i64) -> String {
        sign(&decode_secret(SECRET).unwrap(), msg_id, ts, body)
    }

    #[test]
    fn valid_signature_passes() {
        let body = br#"{"type":"user.created","data":{"id":"user_1"}}"#;
        let sig = signed(body, "msg_1", 1_700_000_000);
        verify(SECRET, "msg_1", "1700000000", &sig, body, 1_700_000_000).unwrap();
    }

    #[test]
    fn any_of_multiple_signatures_passes() {
        let body = b"{}";
        let good = signed(body, "msg_1", 1_700_000_000);
        let header = format!("v1,AAAA {good} v2,BBBB");
        verify(SECRET, "msg_1", "1700000000", &header, body, 1_700_000_010).unwrap();
    }

    #[test]
    fn tampered_body_fails() {
        let sig = signed(b"{}", "msg_1", 1_700_000_000);
        let err = verify(SECRET, "msg_1", "1700000000", &sig, b"{ }", 1_700_000_000)
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn wrong_msg_id_fails() {
        let body = b"{}";
        let sig = signed(body, "msg_1", 1_700_000_000);
        assert!(verify(SECRET, "msg_2", "1700000000", &sig, body, 1_700_000_000).is_err());
    }

    #[test]
    fn stale_timestamp_fails() {
        let body = b"{}";
        let sig = signed(body, "msg_1", 1_700_000_000);
        let err = verify(SECRET, "msg_1", "1700000000", &sig, body, 1_700_000_000 + 301)
            .unwrap_err();
        assert!(err.message().contains("tolerance"));
    }

    #[test]
    fn future_timestamp_fails() {
        let body = b"{}";
        let sig = signed(body, "msg_1", 1_700_000_000);
        assert!(verify(SECRET, "msg_1", "1700000000", &sig, body, 1_700_000_000 - 301).is_err());
    }

    #[test]
    fn bare_base64_secret_accepted() {
        let bare = SECRET.strip_prefix("whsec_").unwrap();
        let body = b"{}";
        let sig = signed(body, "msg_1", 1_700_000_000);
        verify(bare, "msg_1", "1700000000", &sig, body, 1_700_000_000).unwrap();
    }
}
