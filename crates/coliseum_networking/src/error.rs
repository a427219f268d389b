//! # Mesh Error Types
//!
//! Errors surfaced to callers of the mesh.
//!
//! Datagrams that fail to decode, verify or parse are never errors: they are
//! logged and dropped inside the poll step.

use coliseum_ledger::LedgerError;
use coliseum_shared::StorageError;
use thiserror::Error;

use crate::protocol::CodecError;

/// Errors that can occur on the mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Socket failure.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer registry could not be written.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A ledger operation triggered by the mesh failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A `host:port` pair did not resolve to a socket address.
    #[error("cannot resolve address: {0}")]
    AddressResolution(String),

    /// The message exceeds the codec limit, or its datagram exceeds the
    /// receive buffer of every peer.
    #[error("datagram of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// Encoded size.
        size: usize,
        /// Allowed size.
        max: usize,
    },

    /// A client tried to send without a configured peer.
    #[error("no destination: client has no peer configured")]
    NoDestination,

    /// Configuration rejected by validation or parsing.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl From<CodecError> for MeshError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::TooLarge { size, max } => Self::PayloadTooLarge { size, max },
            CodecError::Compress(e) => Self::Io(e),
            CodecError::Serialize(e) => Self::Io(e.into()),
        }
    }
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;
