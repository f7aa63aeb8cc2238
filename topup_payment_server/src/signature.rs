//! Webhook signature verification.
//!
//! Each provider signs its webhook deliveries with a different scheme. Verification always happens on the raw
//! request bytes, before any JSON parsing or UTF-8 conversion, and failures result in a 403 without touching
//! any order state. The schemes that embed a timestamp also enforce a replay window.
//!
//! Candidate signatures are decoded and checked with [`Mac::verify_slice`], which compares in constant time.
//! A candidate that does not decode is simply not a valid signature.
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::errors::ServerError;

type HmacSha256 = Hmac<Sha256>;

/// Replay window for timestamped signatures, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

fn verify_mac(key: &str, parts: &[&[u8]], signature: &[u8]) -> Result<bool, ServerError> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| ServerError::ConfigurationError(format!("Invalid webhook secret: {e}")))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.verify_slice(signature).is_ok())
}

fn verify_hex(key: &str, parts: &[&[u8]], signature: &str) -> Result<bool, ServerError> {
    let Ok(sig) = hex::decode(signature) else {
        return Ok(false);
    };
    verify_mac(key, parts, &sig)
}

fn within_tolerance(timestamp: i64, now: i64) -> bool {
    (now - timestamp).abs() <= SIGNATURE_TOLERANCE_SECS
}

/// Stripe's `Stripe-Signature` header: `t=<unix ts>,v1=<hex hmac>[,v1=...]`. The signed payload is
/// `{t}.{raw body}` and the timestamp must be within the replay window.
pub fn verify_stripe_signature(secret: &str, header: &str, body: &[u8], now: i64) -> Result<bool, ServerError> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => candidates.push(sig.to_string()),
            _ => {},
        }
    }
    let Some(timestamp) = timestamp else {
        return Ok(false);
    };
    if !within_tolerance(timestamp, now) {
        return Ok(false);
    }
    let prefix = format!("{timestamp}.");
    for candidate in &candidates {
        if verify_hex(secret, &[prefix.as_bytes(), body], candidate)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// PayPal transmission signature: base64 HMAC over
/// `{transmission id}|{transmission time}|{webhook id}|{sha256 hex of the raw body}`, keyed with the app's
/// client secret.
pub fn verify_paypal_signature(
    client_secret: &str,
    webhook_id: &str,
    transmission_id: &str,
    transmission_time: &str,
    signature: &str,
    body: &[u8],
) -> Result<bool, ServerError> {
    let digest = hex::encode(Sha256::digest(body));
    let message = format!("{transmission_id}|{transmission_time}|{webhook_id}|{digest}");
    let Ok(sig) = base64::decode(signature) else {
        return Ok(false);
    };
    verify_mac(client_secret, &[message.as_bytes()], &sig)
}

/// Binance Pay signs `{body}{nonce}{timestamp}` and sends the uppercase hex digest in the
/// `BinancePay-Signature` header.
pub fn verify_binance_signature(
    api_secret: &str,
    nonce: &str,
    timestamp: &str,
    signature: &str,
    body: &[u8],
) -> Result<bool, ServerError> {
    verify_hex(api_secret, &[body, nonce.as_bytes(), timestamp.as_bytes()], signature)
}

/// Coinbase Commerce sends a plain hex HMAC of the raw body in `X-CC-Webhook-Signature`.
pub fn verify_coinbase_signature(secret: &str, signature: &str, body: &[u8]) -> Result<bool, ServerError> {
    verify_hex(secret, &[body], signature)
}

/// The supplier's delivery callbacks carry `X-Topup-Signature` (hex HMAC of `{timestamp}.{body}`) and
/// `X-Topup-Timestamp`, with the same replay window as Stripe.
pub fn verify_delivery_signature(
    shared_secret: &str,
    signature: &str,
    timestamp: &str,
    body: &[u8],
    now: i64,
) -> Result<bool, ServerError> {
    let Ok(ts) = timestamp.parse::<i64>() else {
        return Ok(false);
    };
    if !within_tolerance(ts, now) {
        return Ok(false);
    }
    let prefix = format!("{ts}.");
    verify_hex(shared_secret, &[prefix.as_bytes(), body], signature)
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "whsec_test_secret";
    const BODY: &[u8] = br#"{"id":"evt_123","type":"payment_intent.succeeded"}"#;

    fn hmac_bytes(key: &str, parts: &[&[u8]]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key.as_bytes()).unwrap();
        for part in parts {
            mac.update(part);
        }
        mac.finalize().into_bytes().to_vec()
    }

    fn hmac_hex(key: &str, parts: &[&[u8]]) -> String {
        hex::encode(hmac_bytes(key, parts))
    }

    fn stripe_header(secret: &str, body: &[u8], ts: i64) -> String {
        let sig = hmac_hex(secret, &[format!("{ts}.").as_bytes(), body]);
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn stripe_signature_accepts_a_valid_header() {
        let now = 1_700_000_000;
        let header = stripe_header(SECRET, BODY, now - 10);
        assert!(verify_stripe_signature(SECRET, &header, BODY, now).unwrap());
    }

    #[test]
    fn stripe_signature_rejects_a_tampered_body() {
        let now = 1_700_000_000;
        let header = stripe_header(SECRET, BODY, now);
        assert!(!verify_stripe_signature(SECRET, &header, br#"{"id":"evt_evil"}"#, now).unwrap());
    }

    #[test]
    fn stripe_signature_rejects_a_stale_timestamp() {
        let now = 1_700_000_000;
        let header = stripe_header(SECRET, BODY, now - SIGNATURE_TOLERANCE_SECS - 1);
        assert!(!verify_stripe_signature(SECRET, &header, BODY, now).unwrap());
    }

    #[test]
    fn stripe_signature_rejects_a_malformed_header() {
        assert!(!verify_stripe_signature(SECRET, "v1=deadbeef", BODY, 1_700_000_000).unwrap());
        assert!(!verify_stripe_signature(SECRET, "", BODY, 1_700_000_000).unwrap());
        assert!(!verify_stripe_signature(SECRET, "t=1700000000,v1=not-hex", BODY, 1_700_000_000).unwrap());
    }

    #[test]
    fn signatures_verify_over_raw_non_utf8_bytes() {
        // A body that is not valid UTF-8 must still verify byte for byte.
        let body = [0xf0, 0x28, 0x8c, 0x28, 0xff, 0xfe];
        let sig = hmac_hex("cb-secret", &[&body]);
        assert!(verify_coinbase_signature("cb-secret", &sig, &body).unwrap());
        assert!(!verify_coinbase_signature("cb-secret", &sig, &body[..5]).unwrap());
    }

    #[test]
    fn paypal_signature_round_trip() {
        let digest = hex::encode(Sha256::digest(BODY));
        let message = format!("txn-1|2024-06-01T00:00:00Z|wh-42|{digest}");
        let sig = base64::encode(hmac_bytes("pp-secret", &[message.as_bytes()]));
        assert!(verify_paypal_signature("pp-secret", "wh-42", "txn-1", "2024-06-01T00:00:00Z", &sig, BODY).unwrap());
        assert!(
            !verify_paypal_signature("pp-secret", "wh-43", "txn-1", "2024-06-01T00:00:00Z", &sig, BODY).unwrap()
        );
        assert!(
            !verify_paypal_signature("pp-secret", "wh-42", "txn-1", "2024-06-01T00:00:00Z", "%%%", BODY).unwrap()
        );
    }

    #[test]
    fn binance_signature_round_trip() {
        let sig = hex::encode(hmac_bytes("bn-secret", &[BODY, b"nonce123", b"1700000000"])).to_uppercase();
        assert!(verify_binance_signature("bn-secret", "nonce123", "1700000000", &sig, BODY).unwrap());
        assert!(!verify_binance_signature("bn-secret", "nonce124", "1700000000", &sig, BODY).unwrap());
    }

    #[test]
    fn coinbase_signature_round_trip() {
        let sig = hmac_hex("cb-secret", &[BODY]);
        assert!(verify_coinbase_signature("cb-secret", &sig, BODY).unwrap());
        assert!(!verify_coinbase_signature("cb-secret", &sig, b"{}").unwrap());
    }

    #[test]
    fn delivery_signature_enforces_the_replay_window() {
        let now = 1_700_000_000;
        let ts = now - 30;
        let sig = hmac_hex("dl-secret", &[format!("{ts}.").as_bytes(), BODY]);
        assert!(verify_delivery_signature("dl-secret", &sig, &ts.to_string(), BODY, now).unwrap());
        let stale = now - SIGNATURE_TOLERANCE_SECS - 1;
        let sig = hmac_hex("dl-secret", &[format!("{stale}.").as_bytes(), BODY]);
        assert!(!verify_delivery_signature("dl-secret", &sig, &stale.to_string(), BODY, now).unwrap());
        assert!(!verify_delivery_signature("dl-secret", "zz", "not-a-number", BODY, now).unwrap());
    }
}
