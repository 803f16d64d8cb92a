//! Webhook signature verification
//!
//! Header format: `t=<unix seconds>,v1=<hex>` where the hex value is
//! HMAC-SHA256 over `"<t>.<raw body>"` keyed with the shared webhook secret.
//! Several `v1` entries may be present during secret rotation; any match is
//! accepted.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature header sent by the payment provider
pub const SIGNATURE_HEADER: &str = "lingo-signature";

/// Also accepted for providers that keep their own header name
pub const ALTERNATE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature header")]
    Malformed,

    #[error("Signature timestamp outside tolerance")]
    Expired,

    #[error("Signature mismatch")]
    Mismatch,
}

/// Check `header` against the raw request body.
///
/// `now` is the current unix time in seconds.
pub fn verify(
    header: &str,
    payload: &[u8],
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    let issued_at: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }

    // Checked: `t` comes from an unauthenticated header
    let skew = now
        .checked_sub(issued_at)
        .map(i64::unsigned_abs)
        .ok_or(SignatureError::Expired)?;
    if skew > tolerance_secs.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    for signature in signatures {
        let Some(expected) = decode_hex(signature) else {
            continue;
        };
        let mac = signed_mac(timestamp, payload, secret)?;
        // verify_slice compares in constant time
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

/// Header value for `payload` signed at `timestamp`
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let timestamp = timestamp.to_string();
    let digest = match signed_mac(&timestamp, payload, secret) {
        Ok(mac) => mac.finalize().into_bytes(),
        Err(_) => return format!("t={}", timestamp),
    };
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("t={},v1={}", timestamp, hex)
}

fn signed_mac(timestamp: &str, payload: &[u8], secret: &str) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

fn decode_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 {
        return None;
    }
    (0..value.len())
        .step_by(2)
        .map(|i| value.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_signed_payload_verifies() {
        let body = br#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#;
        let header = sign(body, SECRET, NOW);

        assert_eq!(verify(&header, body, SECRET, 300, NOW + 10), Ok(()));
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let header = sign(b"{\"a\":1}", SECRET, NOW);

        assert_eq!(
            verify(&header, b"{\"a\":2}", SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let header = sign(b"{}", "other", NOW);

        assert_eq!(verify(&header, b"{}", SECRET, 300, NOW), Err(SignatureError::Mismatch));
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let header = sign(b"{}", SECRET, NOW);

        assert_eq!(
            verify(&header, b"{}", SECRET, 300, NOW + 301),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_extreme_timestamps_are_expired() {
        for t in [i64::MIN, i64::MAX, -1] {
            let header = format!("t={},v1=00", t);
            assert_eq!(
                verify(&header, b"{}", SECRET, 300, NOW),
                Err(SignatureError::Expired),
                "t={}",
                t
            );
        }
    }

    #[test]
    fn test_future_timestamp_within_tolerance_is_accepted() {
        let header = sign(b"{}", SECRET, NOW + 200);

        assert_eq!(verify(&header, b"{}", SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let valid = sign(b"{}", SECRET, NOW);
        let v1 = valid.split_once(",v1=").unwrap().1;
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), v1);

        assert_eq!(verify(&header, b"{}", SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(verify("", b"{}", SECRET, 300, NOW), Err(SignatureError::Malformed));
        assert_eq!(
            verify("t=abc,v1=00", b"{}", SECRET, 300, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(&format!("t={}", NOW), b"{}", SECRET, 300, NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify(&format!("t={},v1=zz", NOW), b"{}", SECRET, 300, NOW),
            Err(SignatureError::Mismatch)
        );
    }
}
