//! # Message Envelopes
//!
//! Payloads are encrypted with AES-256-GCM under a fresh random key. The key
//! itself is wrapped for each reader with an ephemeral X25519 exchange:
//!
//! ```text
//! payload blob:  nonce (12) || AES-256-GCM(key, plaintext) (n + 16)
//! wrapped key:   ephemeral_pubkey (32) || nonce (12) || AES-256-GCM(wrap_key, key) (48)
//!
//! wrap_key = SHA-256("coliseum-key-wrap-v1" || shared_secret || ephemeral_pubkey || reader_pubkey)
//! ```
//!
//! Keys travel as lowercase hex strings (identity directory, CLI, tests).

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{LedgerError, LedgerResult};

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Length of a wrapped key: ephemeral public key, nonce, key, tag.
pub const WRAPPED_KEY_LEN: usize = 32 + NONCE_LEN + KEY_LEN + 16;

const WRAP_DOMAIN: &[u8] = b"coliseum-key-wrap-v1";

/// An X25519 key pair able to unwrap message keys.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generates a key pair from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_secret_bytes(random_key())
    }

    /// Rebuilds a key pair from raw secret bytes.
    #[must_use]
    pub fn from_secret_bytes(bytes: [u8; KEY_LEN]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuilds a key pair from a hex secret key.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidKey`] if `hex_secret` is not 32 hex-encoded bytes.
    pub fn from_secret_hex(hex_secret: &str) -> LedgerResult<Self> {
        Ok(Self::from_secret_bytes(decode_key(hex_secret)?))
    }

    /// Hex public key, as stored in the identity directory.
    #[must_use]
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.as_bytes())
    }

    /// Hex secret key.
    #[must_use]
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    /// The public half.
    #[must_use]
    pub const fn public_key(&self) -> &PublicKey {
        &self.public
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Parses a hex public key.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidKey`] if `hex_key` is not 32 hex-encoded bytes.
pub fn parse_public_key(hex_key: &str) -> LedgerResult<PublicKey> {
    decode_key(hex_key).map(PublicKey::from)
}

fn decode_key(hex_key: &str) -> LedgerResult<[u8; KEY_LEN]> {
    let bytes = hex::decode(hex_key.trim()).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| LedgerError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", b.len())))
}

/// Fresh random 32-byte key.
#[must_use]
pub fn random_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

/// Encrypts `plaintext`. Output: `nonce || ciphertext+tag`.
///
/// # Errors
///
/// Returns [`LedgerError::Encryption`] if the cipher rejects the input.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> LedgerResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| LedgerError::Encryption)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| LedgerError::Encryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a blob produced by [`encrypt`].
///
/// # Errors
///
/// Returns [`LedgerError::Decryption`] if the blob is truncated or fails authentication.
pub fn decrypt(key: &[u8; KEY_LEN], blob: &[u8]) -> LedgerResult<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(LedgerError::Decryption("blob too short".into()));
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| LedgerError::Decryption(e.to_string()))?;

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| LedgerError::Decryption("authentication failed".into()))
}

/// Wraps `key` so only the holder of `reader`'s secret can recover it.
///
/// # Errors
///
/// Returns [`LedgerError::Encryption`] if the inner encryption fails.
pub fn wrap_key(reader: &PublicKey, key: &[u8; KEY_LEN]) -> LedgerResult<Vec<u8>> {
    let ephemeral = StaticSecret::from(random_key());
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(reader);

    let wrap = derive_wrap_key(shared.as_bytes(), &ephemeral_public, reader);
    let sealed = encrypt(&wrap, key)?;

    let mut out = Vec::with_capacity(WRAPPED_KEY_LEN);
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Recovers a key wrapped by [`wrap_key`].
///
/// # Errors
///
/// Returns [`LedgerError::Decryption`] if the blob is malformed or was
/// wrapped for a different reader.
pub fn unwrap_key(reader: &KeyPair, wrapped: &[u8]) -> LedgerResult<[u8; KEY_LEN]> {
    if wrapped.len() != WRAPPED_KEY_LEN {
        return Err(LedgerError::Decryption(format!(
            "wrapped key must be {WRAPPED_KEY_LEN} bytes, got {}",
            wrapped.len()
        )));
    }

    let (ephemeral_bytes, sealed) = wrapped.split_at(32);
    let mut ephemeral = [0u8; 32];
    ephemeral.copy_from_slice(ephemeral_bytes);
    let ephemeral_public = PublicKey::from(ephemeral);

    let shared = reader.secret.diffie_hellman(&ephemeral_public);
    let wrap = derive_wrap_key(shared.as_bytes(), &ephemeral_public, &reader.public);

    decrypt(&wrap, sealed)?
        .try_into()
        .map_err(|_| LedgerError::Decryption("unwrapped key has wrong length".into()))
}

fn derive_wrap_key(shared: &[u8; 32], ephemeral: &PublicKey, reader: &PublicKey) -> [u8; KEY_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(WRAP_DOMAIN);
    hasher.update(shared);
    hasher.update(ephemeral.as_bytes());
    hasher.update(reader.as_bytes());
    hasher.finalize().into()
}
