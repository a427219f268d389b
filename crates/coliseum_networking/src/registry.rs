//! # Peer Registry
//!
//! Durable address book of mesh peers, persisted as `nodes.json`:
//!
//! ```text
//! [["127.0.0.1", 50007], ["10.0.0.4", 50007]]
//! ```
//!
//! Loading always starts from the built-in bootstrap peers, then appends the
//! persisted ones in file order, dropping duplicates.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use coliseum_shared::{DataDir, JsonFile, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::error::{MeshError, MeshResult};

/// A `(host, port)` transport endpoint. Serialized as `[host, port]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(String, u16)", into = "(String, u16)")]
pub struct PeerAddress {
    /// Host name or IP literal.
    pub host: String,
    /// UDP port.
    pub port: u16,
}

impl PeerAddress {
    /// Creates an address.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves to the first matching socket address.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::AddressResolution`] if the host does not resolve.
    pub fn resolve(&self) -> MeshResult<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| MeshError::AddressResolution(self.to_string()))
    }
}

impl From<(String, u16)> for PeerAddress {
    fn from((host, port): (String, u16)) -> Self {
        Self { host, port }
    }
}

impl From<PeerAddress> for (String, u16) {
    fn from(peer: PeerAddress) -> Self {
        (peer.host, peer.port)
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Bootstrap peers shipped with every node.
#[must_use]
pub fn default_bootstrap_peers() -> Vec<PeerAddress> {
    vec![PeerAddress::new("127.0.0.1", DEFAULT_PORT)]
}

/// File-backed peer list.
#[derive(Clone, Debug)]
pub struct PeerRegistry {
    file: JsonFile<Vec<PeerAddress>>,
    bootstrap: Vec<PeerAddress>,
}

impl PeerRegistry {
    /// Opens the registry at `path` with the given bootstrap peers.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, bootstrap: Vec<PeerAddress>) -> Self {
        Self {
            file: JsonFile::new(path),
            bootstrap,
        }
    }

    /// Opens `nodes.json` inside `data`.
    #[must_use]
    pub fn in_data_dir(data: &DataDir, bootstrap: Vec<PeerAddress>) -> Self {
        Self::open(data.nodes(), bootstrap)
    }

    /// Bootstrap peers followed by persisted peers, without duplicates.
    #[must_use]
    pub fn load(&self) -> Vec<PeerAddress> {
        let mut peers: Vec<PeerAddress> = Vec::new();
        for peer in self.bootstrap.iter().cloned().chain(self.file.load()) {
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        peers
    }

    /// Overwrites the persisted list.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn save(&self, peers: &[PeerAddress]) -> MeshResult<()> {
        self.file.save(&peers.to_vec())?;
        Ok(())
    }

    /// Appends `peer` unless already known. Returns whether it was added.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn add(&self, peer: PeerAddress) -> MeshResult<bool> {
        let mut peers = self.load();
        if peers.contains(&peer) {
            return Ok(false);
        }
        tracing::debug!(%peer, "registered peer");
        peers.push(peer);
        self.save(&peers)?;
        Ok(true)
    }

    /// Keeps only peers for which `is_reachable` returns true.
    ///
    /// Returns the surviving peers.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn prune(&self, mut is_reachable: impl FnMut(&PeerAddress) -> bool) -> MeshResult<Vec<PeerAddress>> {
        let (alive, dead): (Vec<_>, Vec<_>) = self.load().into_iter().partition(|p| is_reachable(p));
        if !dead.is_empty() {
            tracing::info!(removed = dead.len(), kept = alive.len(), "pruned unreachable peers");
        }
        self.save(&alive)?;
        Ok(alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(dir: &tempfile::TempDir) -> PeerRegistry {
        PeerRegistry::in_data_dir(&DataDir::new(dir.path()), default_bootstrap_peers())
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(registry(&dir).load(), default_bootstrap_peers());
    }

    #[test]
    fn test_add_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        let peer = PeerAddress::new("10.0.0.2", 50007);

        assert!(reg.add(peer.clone()).unwrap());
        assert!(!reg.add(peer.clone()).unwrap());
        assert!(!reg.add(PeerAddress::new("127.0.0.1", DEFAULT_PORT)).unwrap());

        let peers = reg.load();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[1], peer);
    }

    #[test]
    fn test_load_dedups_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(&dir);
        std::fs::write(
            dir.path().join("nodes.json"),
            r#"[["10.0.0.3", 1], ["127.0.0.1", 50007], ["10.0.0.2", 2], ["10.0.0.3", 1]]"#,
        )
        .unwrap();

        let hosts: Vec<String> = reg.load().into_iter().map(|p| p.host).collect();
        assert_eq!(hosts, ["127.0.0.1", "10.0.0.3", "10.0.0.2"]);
    }

    #[test]
    fn test_prune_keeps_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let reg = PeerRegistry::in_data_dir(&DataDir::new(dir.path()), Vec::new());
        let p1 = PeerAddress::new("10.0.0.1", 1);
        let p2 = PeerAddress::new("10.0.0.2", 2);
        reg.save(&[p1.clone(), p2]).unwrap();

        let kept = reg.prune(|p| *p == p1).unwrap();
        assert_eq!(kept, vec![p1.clone()]);
        assert_eq!(reg.load(), vec![p1]);
    }

    #[test]
    fn test_wire_format_is_pair() {
        let json = serde_json::to_string(&PeerAddress::new("h", 7)).unwrap();
        assert_eq!(json, r#"["h",7]"#);
    }

    #[test]
    fn test_resolve_loopback() {
        let addr = PeerAddress::new("127.0.0.1", 9).resolve().unwrap();
        assert_eq!(addr.port(), 9);
        assert_eq!(PeerAddress::from(addr), PeerAddress::new("127.0.0.1", 9));
    }
}
