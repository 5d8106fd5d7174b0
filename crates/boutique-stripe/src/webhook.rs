//! Webhook signature verification.
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>...]`.
//! The expected signature is HMAC-SHA256 over `"{t}.{payload}"` keyed with the
//! endpoint secret. Any `v1` entry may match.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{SignatureError, StripeError};
use crate::types::{Event, WebhookEvent};

type HmacSha256 = Hmac<Sha256>;

/// Default maximum age of a signed webhook.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn expected_signature(payload: &[u8], secret: &str, timestamp: i64) -> Vec<u8> {
    // HMAC accepts keys of any length, so new_from_slice cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Builds a valid signature header for `payload`. Used to sign test fixtures.
#[must_use]
pub fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!(
        "t={timestamp},v1={}",
        hex::encode(expected_signature(payload, secret, timestamp))
    )
}

/// Verifies `header` against `payload` at time `now` (unix seconds).
///
/// # Errors
///
/// Returns the [`SignatureError`] describing why verification failed.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::MalformedHeader)?;
        match key {
            "t" => {
                timestamp = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| SignatureError::MalformedHeader)?,
                );
            }
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            // v0 and future schemes are ignored.
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let age_secs = now - timestamp;
    if age_secs > tolerance_secs {
        return Err(SignatureError::OutsideTolerance {
            age_secs,
            tolerance_secs,
        });
    }

    let expected = expected_signature(payload, secret, timestamp);
    let matched = signatures
        .iter()
        .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Verifies the signature, then decodes the event.
///
/// # Errors
///
/// - [`StripeError::Signature`] if the header does not verify.
/// - [`StripeError::Deserialize`] if the payload is not a valid event.
pub fn construct_event(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
) -> Result<WebhookEvent, StripeError> {
    verify_signature(
        payload,
        header,
        secret,
        tolerance_secs,
        chrono::Utc::now().timestamp(),
    )?;

    let event: Event = serde_json::from_slice(payload).map_err(|e| StripeError::Deserialize {
        context: "webhook payload".to_string(),
        source: e,
    })?;

    WebhookEvent::from_event(event)
}
