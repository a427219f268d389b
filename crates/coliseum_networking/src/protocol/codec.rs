//! # Envelope Codec
//!
//! ## Encoding
//!
//! ```text
//! message ─► canonical JSON ─► XOR(key)? ─┬─► SHA-256 ─────────────► h
//!                                         └─► zlib ─► base64 ─► split
//!                                                               │
//!                                          a = "HLPC" + first half
//!                                          b = "HLPC" + second half
//! ```
//!
//! Decoding runs the steps backwards and returns `None` on any failure:
//! missing anchor, bad base64, inflate error, digest mismatch, or bytes that
//! are not JSON. Nothing here ever errors into the caller.
//!
//! Both directions share one size limit: encode refuses canonical messages
//! over [`MAX_MESSAGE_SIZE`] bytes and decode never inflates past it.
//!
//! The XOR key is obfuscation only. Integrity comes from `h` (and, between
//! nodes sharing a secret, from the HMAC in `sig`).

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use coliseum_shared::ANCHOR_TAG;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::canonical_json;

/// Bytes fed to the compressor per write.
const COMPRESS_CHUNK: usize = 1024;

/// Largest canonical message, in bytes, the codec will encode or inflate.
pub const MAX_MESSAGE_SIZE: usize = 1 << 20;

/// Errors raised while encoding.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Canonical bytes exceed [`MAX_MESSAGE_SIZE`].
    #[error("message of {size} bytes exceeds the {max} byte codec limit")]
    TooLarge {
        /// Canonical size.
        size: usize,
        /// Allowed size.
        max: usize,
    },

    /// The compressor failed.
    #[error("compression failed: {0}")]
    Compress(#[from] io::Error),

    /// The envelope could not be serialized.
    #[error("envelope serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Envelope format version reported in `p`.
pub const ENVELOPE_VERSION: u32 = 1;

/// The outer wire structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// First fragment, anchor-prefixed.
    pub a: String,
    /// Second fragment, anchor-prefixed.
    pub b: String,
    /// Hex SHA-256 of the (possibly XOR'd) canonical bytes.
    pub h: String,
    /// Optional metadata. Never needed to decode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<Value>,
}

/// Encoder/decoder for one key configuration.
#[derive(Clone, Debug, Default)]
pub struct PacketCodec {
    key: Option<Vec<u8>>,
    metadata: bool,
}

impl PacketCodec {
    /// Codec with an optional XOR key. An empty key means no key.
    #[must_use]
    pub fn new(key: Option<&[u8]>) -> Self {
        Self {
            key: key.filter(|k| !k.is_empty()).map(<[u8]>::to_vec),
            metadata: false,
        }
    }

    /// Attach `{"v", "len"}` metadata to every envelope.
    #[must_use]
    pub const fn with_metadata(mut self, enabled: bool) -> Self {
        self.metadata = enabled;
        self
    }

    /// Builds the envelope for `message`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TooLarge`] past [`MAX_MESSAGE_SIZE`], or the
    /// compressor's error.
    pub fn seal(&self, message: &Value) -> Result<Envelope, CodecError> {
        let mut bytes = canonical_json(message);
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(CodecError::TooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        if let Some(key) = &self.key {
            xor_in_place(&mut bytes, key);
        }

        let digest = hex::encode(Sha256::digest(&bytes));

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        for chunk in bytes.chunks(COMPRESS_CHUNK) {
            encoder.write_all(chunk)?;
        }
        let compressed = encoder.finish()?;

        let encoded = BASE64.encode(&compressed);
        // Base64 is ASCII, any index is a char boundary
        let (first, second) = encoded.split_at(encoded.len() / 2);

        Ok(Envelope {
            a: format!("{ANCHOR_TAG}{first}"),
            b: format!("{ANCHOR_TAG}{second}"),
            h: digest,
            p: self.metadata.then(|| {
                serde_json::json!({ "v": ENVELOPE_VERSION, "len": compressed.len() })
            }),
        })
    }

    /// Recovers the message inside `envelope`.
    #[must_use]
    pub fn open(&self, envelope: &Envelope) -> Option<Value> {
        let first = envelope.a.strip_prefix(ANCHOR_TAG)?;
        let second = envelope.b.strip_prefix(ANCHOR_TAG)?;

        let compressed = BASE64.decode(format!("{first}{second}")).ok()?;

        // One byte of headroom so oversized input is rejected, not truncated
        let mut bytes = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .take(MAX_MESSAGE_SIZE as u64 + 1)
            .read_to_end(&mut bytes)
            .ok()?;
        if bytes.len() > MAX_MESSAGE_SIZE {
            return None;
        }

        if hex::encode(Sha256::digest(&bytes)) != envelope.h {
            return None;
        }

        if let Some(key) = &self.key {
            xor_in_place(&mut bytes, key);
        }

        serde_json::from_slice(&bytes).ok()
    }

    /// Encodes `message` into datagram bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Self::seal`].
    pub fn encode(&self, message: &Value) -> Result<Vec<u8>, CodecError> {
        let envelope = self.seal(message)?;
        Ok(serde_json::to_vec(&envelope)?)
    }

    /// Decodes datagram bytes. `None` on any failure.
    #[must_use]
    pub fn decode(&self, datagram: &[u8]) -> Option<Value> {
        let envelope: Envelope = serde_json::from_slice(datagram).ok()?;
        self.open(&envelope)
    }
}

fn xor_in_place(bytes: &mut [u8], key: &[u8]) {
    for (byte, k) in bytes.iter_mut().zip(key.iter().cycle()) {
        *byte ^= k;
    }
}
