//! # Transport Layer
//!
//! The one socket a mesh node sends and receives through.
//!
//! ## Design
//!
//! - One non-blocking socket per node, broadcast enabled
//! - `recv()` returns immediately: no data is `None`, never an error
//! - Reliability is bookkeeping on top ([`ReliabilityLayer`]); the socket
//!   itself stays fire-and-forget

mod reliability;

pub use reliability::{PendingAck, ReliabilityLayer};

use std::io;
use std::net::SocketAddr;

use coliseum_shared::RECV_BUFFER_SIZE;

/// Non-blocking, broadcast-capable UDP socket that counts its traffic.
pub struct UdpTransport {
    socket: std::net::UdpSocket,
    local_addr: SocketAddr,
    recv_buffer: [u8; RECV_BUFFER_SIZE],
    stats: TrafficStats,
}

/// Running traffic counters for one node.
///
/// The socket fills in the packet and byte counts. The node reports the
/// datagrams it throws away and the reliable copies it sends again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Datagrams handed to the socket.
    pub packets_sent: u64,
    /// Datagrams read off the socket.
    pub packets_received: u64,
    /// Bytes handed to the socket.
    pub bytes_sent: u64,
    /// Bytes read off the socket.
    pub bytes_received: u64,
    /// Sends the socket refused.
    pub send_errors: u64,
    /// Received datagrams that failed decode, signature check or parse.
    pub dropped: u64,
    /// Reliable messages sent again after an ack timeout.
    pub resent: u64,
}

impl UdpTransport {
    /// Binds a non-blocking, broadcast-capable socket at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound or configured.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = std::net::UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;

        let local_addr = socket.local_addr()?;
        tracing::debug!(%local_addr, "udp transport bound");

        Ok(Self {
            socket,
            local_addr,
            recv_buffer: [0u8; RECV_BUFFER_SIZE],
            stats: TrafficStats::default(),
        })
    }

    /// Address the socket is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sends a datagram to the specified address.
    ///
    /// # Errors
    ///
    /// Returns the socket error; the failure is also counted in the stats.
    pub fn send_to(&mut self, data: &[u8], addr: SocketAddr) -> io::Result<usize> {
        match self.socket.send_to(data, addr) {
            Ok(n) => {
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.stats.send_errors += 1;
                Err(e)
            }
        }
    }

    /// Receives a datagram.
    ///
    /// Returns the datagram and source address, or None if nothing is waiting.
    pub fn recv(&mut self) -> Option<(&[u8], SocketAddr)> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((len, addr)) => {
                    self.stats.packets_received += 1;
                    self.stats.bytes_received += len as u64;
                    return Some((&self.recv_buffer[..len], addr));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                // ICMP port-unreachable from an earlier send surfaces here on
                // some platforms. Skip it and keep draining.
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {}
                Err(e) => {
                    tracing::trace!(error = %e, "recv failed");
                    return None;
                }
            }
        }
    }

    /// Traffic so far.
    #[must_use]
    pub const fn stats(&self) -> &TrafficStats {
        &self.stats
    }

    /// Counts a received datagram the node discarded.
    pub fn record_dropped(&mut self) {
        self.stats.dropped += 1;
    }

    /// Counts a reliable retransmission.
    pub fn record_resent(&mut self) {
        self.stats.resent += 1;
    }
}
