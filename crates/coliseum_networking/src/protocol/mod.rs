//! # Wire Protocol
//!
//! Every datagram is one JSON envelope:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ {"a": "HLPC<first half>", "b": "HLPC<second half>",          │
//! │  "h": "<sha256 hex>", "p": {"v": 1, "len": n}?}              │
//! └──────────────────────────────────────────────────────────────┘
//!            │
//!            ▼ decode (codec)
//! ┌──────────────────────────────────────────────────────────────┐
//! │ {"type": "announce", "games": [...], "reliable": true,       │
//! │  "seq": 7, "sig": "<hmac hex>"}                              │
//! └──────────────────────────────────────────────────────────────┘
//!            │
//!            ▼ parse (messages) + verify (signing)
//!      Frame { message: Control(Announce {..}), reliable, seq }
//! ```
//!
//! - [`codec`]: envelope framing, compression, integrity digest, XOR key
//! - [`signing`]: optional HMAC-SHA256 over the message
//! - [`messages`]: the closed set of control messages plus free-form payloads

pub mod codec;
pub mod messages;
pub mod signing;

pub use codec::{CodecError, Envelope, PacketCodec, MAX_MESSAGE_SIZE};
pub use messages::{ControlMessage, Frame, Message};

use serde_json::{Map, Value};

/// Compact JSON with object keys in sorted order.
///
/// Every node derives the same bytes from the same value, so digests and
/// signatures computed over it agree across the mesh.
#[must_use]
pub fn canonical_json(value: &Value) -> Vec<u8> {
    // `Map` is BTreeMap-backed, so keys serialize sorted. Encoding a Value
    // cannot fail.
    serde_json::to_vec(value).unwrap_or_default()
}

/// [`canonical_json`] for a bare object.
#[must_use]
pub fn canonical_object(map: &Map<String, Value>) -> Vec<u8> {
    canonical_json(&Value::Object(map.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let value: Value = serde_json::from_str(r#"{"z": 1, "a": {"y": 2, "b": 3}}"#).unwrap();
        assert_eq!(canonical_json(&value), br#"{"a":{"b":3,"y":2},"z":1}"#);
    }
}
