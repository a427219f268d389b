//! # Coliseum Ledger
//!
//! Tamper-evident record of matches, wagers and moderated messages that any
//! node can verify and merge without a central authority.
//!
//! ## Design Principles
//!
//! 1. **Hash-chained** - every block commits to its predecessor's hash
//! 2. **Longest valid chain wins** - merging never accepts a shorter, equal or broken chain
//! 3. **Fail closed** - verification is a total predicate, malformed input is just invalid
//! 4. **Dual envelopes** - the recipient and the moderator each hold a wrapped message key
//!
//! ## Example
//!
//! ```rust,ignore
//! use coliseum_ledger::{FileIdentityDirectory, Ledger};
//! use coliseum_shared::DataDir;
//!
//! let data = DataDir::new("SavedGames");
//! let ledger = Ledger::open(&data, FileIdentityDirectory::in_data_dir(&data));
//!
//! ledger.add_game(&["alice", "bob"], "alice", 5, None)?;
//! assert_eq!(ledger.balance_of("alice"), 5);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod block;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod ledger;

pub use block::{hash_of, verify_chain, verify_chain_value, Block, GameBlock, MessageBlock, MessageTag};
pub use crypto::KeyPair;
pub use error::{LedgerError, LedgerResult};
pub use identity::{Account, FileIdentityDirectory, IdentityDirectory, MemoryIdentityDirectory};
pub use ledger::{Balances, Contract, Contracts, Ledger};
