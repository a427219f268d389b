//! # Network & Storage Constants
//!
//! Values shared by every node on the mesh.
//!
//! **CRITICAL:** The wire values are part of the protocol.
//! Nodes that disagree on them cannot talk to each other.

// =============================================================================
// NETWORK CONFIGURATION
// =============================================================================

/// Default UDP port for mesh traffic and discovery.
pub const DEFAULT_PORT: u16 = 50007;

/// Default broadcast address used by discovery.
pub const DEFAULT_BROADCAST_ADDRESS: &str = "255.255.255.255";

/// Receive buffer size. Datagrams larger than this are truncated by the OS,
/// so senders refuse to emit them.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Marker prefixed to both halves of an encoded envelope.
pub const ANCHOR_TAG: &str = "HLPC";

// =============================================================================
// STORAGE LAYOUT
// =============================================================================

/// Known peers: array of `[host, port]` pairs.
pub const NODES_FILE: &str = "nodes.json";

/// The block chain: array of block objects.
pub const CHAIN_FILE: &str = "chain.json";

/// Wager balances: object mapping user id to integer.
pub const BALANCES_FILE: &str = "balances.json";

/// Pending escrow contracts: object mapping request id to `{players, bet}`.
pub const CONTRACTS_FILE: &str = "contracts.json";

/// Identity directory: object mapping user id to `{level, public_key}`.
pub const ACCOUNTS_FILE: &str = "accounts.json";
