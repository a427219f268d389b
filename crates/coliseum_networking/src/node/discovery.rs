//! # Discovery and Latency
//!
//! The only helpers that wait. Each loops over non-blocking receives with a
//! 1 ms sleep until its answer arrives or its timeout elapses.
//!
//! ```text
//! discover:  fresh socket ──discover──► broadcast:port
//!                         ◄───host───── every host that hears it
//!
//! ping_node: node socket  ──ping{n}──►  addr
//!                         ◄──pong{n}──  (other traffic is queued for poll)
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use coliseum_shared::{DEFAULT_BROADCAST_ADDRESS, DEFAULT_PORT};

use super::{open_frame, MeshNode, POLL_INTERVAL};
use crate::config::MeshConfig;
use crate::error::MeshResult;
use crate::protocol::{ControlMessage, Frame, Message, PacketCodec};
use crate::registry::PeerAddress;
use crate::transport::UdpTransport;

/// Parameters for [`MeshNode::discover`].
#[derive(Clone, Debug)]
pub struct DiscoverOptions {
    /// How long to collect replies.
    pub timeout: Duration,
    /// Port hosts listen on.
    pub port: u16,
    /// Where the probe is sent.
    pub broadcast_address: String,
    /// XOR key shared with the hosts.
    pub encryption_key: Option<Vec<u8>>,
    /// HMAC secret shared with the hosts.
    pub shared_secret: Option<Vec<u8>>,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            port: DEFAULT_PORT,
            broadcast_address: DEFAULT_BROADCAST_ADDRESS.to_owned(),
            encryption_key: None,
            shared_secret: None,
        }
    }
}

impl From<&MeshConfig> for DiscoverOptions {
    fn from(config: &MeshConfig) -> Self {
        Self {
            port: config.port,
            broadcast_address: config.broadcast_address.clone(),
            encryption_key: config.encryption_key_bytes().map(<[u8]>::to_vec),
            shared_secret: config.shared_secret_bytes().map(<[u8]>::to_vec),
            ..Self::default()
        }
    }
}

impl MeshNode {
    /// Broadcasts `discover` and returns the address of every host that
    /// replied before the timeout, in reply order.
    ///
    /// `between` runs once per receive round; a test can poll an in-process
    /// host there.
    ///
    /// # Errors
    ///
    /// Fails if the probe socket cannot be bound or the probe cannot be sent.
    pub fn discover(options: &DiscoverOptions, mut between: impl FnMut()) -> MeshResult<Vec<SocketAddr>> {
        let mut transport = UdpTransport::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
        let codec = PacketCodec::new(options.encryption_key.as_deref());
        let secret = options.shared_secret.as_deref();

        let target = PeerAddress::new(options.broadcast_address.clone(), options.port).resolve()?;
        let datagram = super::seal_frame(&codec, secret, &Frame::new(ControlMessage::Discover.into()))?;
        transport.send_to(&datagram, target)?;

        let start = Instant::now();
        let mut hosts = Vec::new();

        loop {
            between();

            while let Some((data, from)) = transport.recv() {
                let is_host = matches!(
                    open_frame(&codec, secret, data),
                    Some(Frame { message: Message::Control(ControlMessage::Host), .. })
                );
                if is_host && !hosts.contains(&from) {
                    hosts.push(from);
                }
            }

            if start.elapsed() >= options.timeout {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        tracing::info!(found = hosts.len(), %target, "discovery finished");
        Ok(hosts)
    }

    /// Round-trip time to `addr`, or `None` if no pong arrives within
    /// `timeout`. Payloads received meanwhile are kept for the next `poll`.
    pub fn ping_node(&mut self, addr: SocketAddr, timeout: Duration) -> Option<Duration> {
        let nonce = rand::random::<u64>();
        let start = Instant::now();

        if let Err(e) = self.send_to(ControlMessage::Ping { nonce }, addr) {
            tracing::debug!(%addr, error = %e, "ping send failed");
            return None;
        }

        let rtt = loop {
            self.receive_pending();
            if let Some(arrived) = self.pongs.remove(&nonce) {
                break Some(arrived.saturating_duration_since(start));
            }
            if start.elapsed() >= timeout {
                break None;
            }
            thread::sleep(POLL_INTERVAL);
        };

        // Late pongs from earlier probes can never match again
        self.pongs.clear();
        tracing::trace!(%addr, ?rtt, "ping finished");
        rtt
    }

    /// The candidate with the lowest round-trip time. Unreachable candidates
    /// are skipped; `None` if none answer.
    pub fn select_best_node(&mut self, candidates: &[SocketAddr], timeout: Duration) -> Option<SocketAddr> {
        candidates
            .iter()
            .filter_map(|&addr| self.ping_node(addr, timeout).map(|rtt| (rtt, addr)))
            .min_by_key(|&(rtt, _)| rtt)
            .map(|(_, addr)| addr)
    }

    /// Drops registry peers that do not answer a ping within `timeout`.
    ///
    /// Returns the surviving peers.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn prune_registry(&mut self, timeout: Duration) -> MeshResult<Vec<PeerAddress>> {
        let registry = self.registry.clone();
        registry.prune(|peer| {
            peer.resolve()
                .ok()
                .and_then(|addr| self.ping_node(addr, timeout))
                .is_some()
        })
    }
}
