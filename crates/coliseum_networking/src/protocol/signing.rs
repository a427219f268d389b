//! # Message Signing
//!
//! Nodes sharing a secret authenticate each message with
//!
//! ```text
//! sig = hex(HMAC-SHA256(secret, canonical_json(message without "sig")))
//! ```
//!
//! When a node has a secret, unsigned or mis-signed messages are dropped.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use super::canonical_object;

type HmacSha256 = Hmac<Sha256>;

/// Key of the signature field.
pub const SIG_KEY: &str = "sig";

fn mac_over(secret: &[u8], message: &Map<String, Value>) -> Option<HmacSha256> {
    let mut unsigned = message.clone();
    unsigned.remove(SIG_KEY);

    // HMAC accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(&canonical_object(&unsigned));
    Some(mac)
}

/// Computes the signature of `message`, ignoring any existing `sig`.
#[must_use]
pub fn signature(secret: &[u8], message: &Map<String, Value>) -> String {
    mac_over(secret, message)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Replaces `sig` with a fresh signature.
pub fn sign(secret: &[u8], message: &mut Map<String, Value>) {
    let sig = signature(secret, message);
    message.insert(SIG_KEY.to_owned(), Value::String(sig));
}

/// True if `message` carries a valid `sig` for `secret`.
#[must_use]
pub fn verify(secret: &[u8], message: &Map<String, Value>) -> bool {
    let Some(sig) = message.get(SIG_KEY).and_then(Value::as_str) else {
        return false;
    };
    let Ok(tag) = hex::decode(sig) else {
        return false;
    };
    mac_over(secret, message).is_some_and(|mac| mac.verify_slice(&tag).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message() -> Map<String, Value> {
        match json!({"type": "ping", "nonce": 7}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let mut msg = message();
        sign(b"secret", &mut msg);
        assert_eq!(msg[SIG_KEY].as_str().unwrap().len(), 64);
        assert!(verify(b"secret", &msg));
    }

    #[test]
    fn test_wrong_secret_or_tamper_fails() {
        let mut msg = message();
        sign(b"secret", &mut msg);
        assert!(!verify(b"other", &msg));

        msg.insert("nonce".into(), json!(8));
        assert!(!verify(b"secret", &msg));
    }

    #[test]
    fn test_missing_or_malformed_sig_fails() {
        let mut msg = message();
        assert!(!verify(b"secret", &msg));
        msg.insert(SIG_KEY.into(), json!("not hex"));
        assert!(!verify(b"secret", &msg));
        msg.insert(SIG_KEY.into(), json!(12));
        assert!(!verify(b"secret", &msg));
    }

    #[test]
    fn test_signature_ignores_key_order() {
        let a: Map<String, Value> = serde_json::from_str(r#"{"b": 1, "a": 2}"#).unwrap();
        let b: Map<String, Value> = serde_json::from_str(r#"{"a": 2, "b": 1}"#).unwrap();
        assert_eq!(signature(b"s", &a), signature(b"s", &b));
    }
}
