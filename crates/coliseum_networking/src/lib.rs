//! # Coliseum Networking - The Mesh
//!
//! Serverless UDP networking for Coliseum matches: every node can discover,
//! route and verify.
//!
//! ## Architecture
//!
//! - **Registry**: durable `(host, port)` address book
//! - **Sync**: sparse per-tick state deltas, remote clock offset
//! - **Protocol**: JSON envelope codec, HMAC signing, typed control messages
//! - **Transport**: non-blocking UDP socket plus ack/retry bookkeeping
//! - **Node**: role-aware dispatch, discovery, latency probes, ledger gossip
//!
//! ## Trust Model
//!
//! ```text
//! NODE A                              NODE B
//!   |                                   |
//!   |--- chain_update (signed) -------->|
//!   |                                   | <- verify sig, verify every hash
//!   |                                   | <- adopt only if strictly longer
//! ```
//!
//! A node never trusts a peer's claims: envelopes carry a digest, messages
//! carry an HMAC when a secret is shared, and chains are re-verified block
//! by block before they replace anything.
//!
//! ## Example
//!
//! ```rust,ignore
//! use coliseum_networking::{MeshConfig, MeshNode};
//!
//! let mut host = MeshNode::bind(&MeshConfig::host(50007))?;
//! loop {
//!     for (from, payload) in host.poll() {
//!         tracing::info!(%from, ?payload, "state");
//!     }
//!     host.process_reliable();
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod node;
pub mod protocol;
pub mod registry;
pub mod sync;
pub mod transport;

pub use config::{MeshConfig, Role};
pub use error::{MeshError, MeshResult};
pub use node::{DiscoverOptions, MeshNode};
pub use protocol::{CodecError, ControlMessage, Envelope, Frame, Message, PacketCodec};
pub use registry::{PeerAddress, PeerRegistry};
pub use sync::{ClockOffset, DeltaSync, StateSnapshot};
pub use transport::{ReliabilityLayer, TrafficStats, UdpTransport};
