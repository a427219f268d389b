//! # Coliseum Shared
//!
//! Common types used by both the ledger and the mesh node.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - sockets or the transport layer
//! - cryptographic primitives
//!
//! Every persisted table (peers, chain, balances, contracts, accounts) goes
//! through [`storage::JsonFile`], which replaces files atomically.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod storage;

pub use constants::{
    ANCHOR_TAG, DEFAULT_BROADCAST_ADDRESS, DEFAULT_PORT, RECV_BUFFER_SIZE,
};
pub use storage::{DataDir, JsonFile, StorageError, StorageResult};
