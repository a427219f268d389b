//! # Ledger Error Types
//!
//! All errors that can occur in the ledger.
//!
//! Chain verification and merging never produce errors: an invalid chain is
//! simply rejected. The variants below are programming/data errors the
//! caller must handle explicitly.

use coliseum_shared::StorageError;
use thiserror::Error;

/// Errors that can occur in the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A player is not registered in the identity directory.
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    /// The message recipient is not registered in the identity directory.
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    /// Decryption was attempted on a block that is not a message.
    #[error("block is not a message block")]
    NotAMessageBlock,

    /// A key could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encrypting a payload or key envelope failed.
    #[error("encryption failed")]
    Encryption,

    /// Ciphertext was malformed or failed authentication.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// A persisted table could not be written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
