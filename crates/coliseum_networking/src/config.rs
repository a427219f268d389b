//! # Node Configuration
//!
//! Every field has a default, so an empty TOML file is a valid client config:
//!
//! ```toml
//! role = "host"
//! bind_address = "0.0.0.0"
//! port = 50007
//! peer_address = ["10.0.0.7", 50007]
//! ack_timeout_ms = 500
//! default_max_retries = 3
//! shared_secret = "arena-secret"
//! data_dir = "SavedGames"
//! bootstrap_peers = [["127.0.0.1", 50007]]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use coliseum_shared::{DataDir, DEFAULT_BROADCAST_ADDRESS, DEFAULT_PORT};
use serde::Deserialize;

use crate::error::{MeshError, MeshResult};
use crate::registry::{default_bootstrap_peers, PeerAddress};

/// What a node does with incoming traffic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Binds a known port, answers discovery, tracks clients and games.
    Host,
    /// Binds an ephemeral port and talks to one peer.
    #[default]
    Client,
}

/// Mesh node configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Host or client.
    pub role: Role,
    /// Interface to bind.
    pub bind_address: String,
    /// Port a host binds and discovery targets. Clients bind port 0.
    pub port: u16,
    /// Peer a client sends to.
    pub peer_address: Option<PeerAddress>,
    /// Discovery broadcast target.
    pub broadcast_address: String,
    /// Base resend timeout for reliable sends.
    pub ack_timeout_ms: u64,
    /// Retry budget when a send does not name one.
    pub default_max_retries: u32,
    /// Optional XOR key for envelopes.
    pub encryption_key: Option<String>,
    /// Optional HMAC secret. Nodes with a secret drop unsigned traffic.
    pub shared_secret: Option<String>,
    /// Attach version/length metadata to envelopes.
    pub envelope_metadata: bool,
    /// Directory holding `nodes.json` and the ledger files.
    pub data_dir: PathBuf,
    /// Peers every registry starts with.
    pub bootstrap_peers: Vec<PeerAddress>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            role: Role::Client,
            bind_address: "0.0.0.0".to_owned(),
            port: DEFAULT_PORT,
            peer_address: None,
            broadcast_address: DEFAULT_BROADCAST_ADDRESS.to_owned(),
            ack_timeout_ms: 500,
            default_max_retries: 3,
            encryption_key: None,
            shared_secret: None,
            envelope_metadata: false,
            data_dir: PathBuf::from("SavedGames"),
            bootstrap_peers: default_bootstrap_peers(),
        }
    }
}

impl MeshConfig {
    /// Host config on `port`.
    #[must_use]
    pub fn host(port: u16) -> Self {
        Self {
            role: Role::Host,
            port,
            ..Self::default()
        }
    }

    /// Client config talking to `peer`.
    #[must_use]
    pub fn client(peer: PeerAddress) -> Self {
        Self {
            role: Role::Client,
            peer_address: Some(peer),
            ..Self::default()
        }
    }

    /// Parses TOML and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] on parse or validation failure.
    pub fn from_toml_str(text: &str) -> MeshResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| MeshError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::Io`] if the file cannot be read, or
    /// [`MeshError::InvalidConfig`] if it does not parse or validate.
    pub fn load(path: impl AsRef<Path>) -> MeshResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rejects settings that would make the node misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> MeshResult<()> {
        if self.ack_timeout_ms == 0 {
            return Err(MeshError::InvalidConfig("ack_timeout_ms must be positive".into()));
        }
        if self.encryption_key.as_deref() == Some("") {
            return Err(MeshError::InvalidConfig("encryption_key must not be empty".into()));
        }
        if self.bind_address.is_empty() {
            return Err(MeshError::InvalidConfig("bind_address must not be empty".into()));
        }
        Ok(())
    }

    /// Address the node's socket binds.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::AddressResolution`] if `bind_address` does not resolve.
    pub fn bind_socket_addr(&self) -> MeshResult<SocketAddr> {
        let port = match self.role {
            Role::Host => self.port,
            Role::Client => 0,
        };
        PeerAddress::new(self.bind_address.clone(), port).resolve()
    }

    /// Base resend timeout.
    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Storage layout rooted at `data_dir`.
    #[must_use]
    pub fn data(&self) -> DataDir {
        DataDir::new(self.data_dir.clone())
    }

    /// XOR key bytes, if any.
    #[must_use]
    pub fn encryption_key_bytes(&self) -> Option<&[u8]> {
        self.encryption_key.as_deref().map(str::as_bytes)
    }

    /// HMAC secret bytes, if any.
    #[must_use]
    pub fn shared_secret_bytes(&self) -> Option<&[u8]> {
        self.shared_secret.as_deref().map(str::as_bytes)
    }
}
