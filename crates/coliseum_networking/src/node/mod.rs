//! # Mesh Node
//!
//! One UDP socket, driven by the caller's loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MESH NODE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  poll() ──► recv ──► codec ──► sig check ──► Frame          │
//! │                                               │             │
//! │                     reliable? ──► ack ◄───────┤             │
//! │                                               │             │
//! │              Control ──► dispatch ──► registry / views /    │
//! │                                       reliability / ledger  │
//! │              Payload ──► returned to caller                 │
//! │                                                             │
//! │  send_state / send_snapshot / send_reliable ──► codec ──►   │
//! │  process_reliable() ──► resend overdue, drop exhausted      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Roles
//!
//! - **Host**: answers discovery, tracks connected clients (anyone who sent
//!   a payload or announced), known game hosts and live clients, and gossips
//!   those views to registry peers.
//! - **Client**: talks to one configured peer, records hosts it hears from.
//!
//! Nothing here spawns threads. Only the latency helpers in [`discovery`]
//! wait, and only up to their timeout.

pub mod discovery;

pub use discovery::DiscoverOptions;

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use coliseum_ledger::Ledger;
use coliseum_shared::RECV_BUFFER_SIZE;
use serde_json::Value;

use crate::config::{MeshConfig, Role};
use crate::error::{MeshError, MeshResult};
use crate::protocol::{signing, ControlMessage, Frame, Message, PacketCodec};
use crate::registry::{PeerAddress, PeerRegistry};
use crate::sync::{DeltaSync, StateSnapshot};
use crate::transport::{ReliabilityLayer, TrafficStats, UdpTransport};

/// Sleep between receive attempts inside the waiting helpers.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A peer on the mesh.
pub struct MeshNode {
    role: Role,
    transport: UdpTransport,
    codec: PacketCodec,
    secret: Option<Vec<u8>>,
    /// Where a client sends.
    peer: Option<SocketAddr>,
    registry: PeerRegistry,
    reliability: ReliabilityLayer,
    default_max_retries: u32,
    /// Diffs our own outgoing snapshots.
    outgoing: DeltaSync,
    /// Connected clients (host).
    clients: BTreeSet<SocketAddr>,
    /// Known game hosts.
    games: BTreeSet<PeerAddress>,
    /// Known live clients.
    live_clients: BTreeSet<PeerAddress>,
    /// Pong arrival times by nonce.
    pongs: HashMap<u64, Instant>,
    /// Payloads received but not yet returned by `poll`.
    inbox: VecDeque<(SocketAddr, StateSnapshot)>,
    ledger: Option<Ledger>,
}

impl MeshNode {
    /// Binds a node as described by `config`.
    ///
    /// # Errors
    ///
    /// Fails on invalid config, unresolvable addresses, or bind errors.
    pub fn bind(config: &MeshConfig) -> MeshResult<Self> {
        config.validate()?;

        let transport = UdpTransport::bind(config.bind_socket_addr()?)?;
        let peer = config
            .peer_address
            .as_ref()
            .map(PeerAddress::resolve)
            .transpose()?;

        tracing::info!(
            role = ?config.role,
            local = %transport.local_addr(),
            peer = ?peer,
            signed = config.shared_secret.is_some(),
            "mesh node bound"
        );

        Ok(Self {
            role: config.role,
            transport,
            codec: PacketCodec::new(config.encryption_key_bytes()).with_metadata(config.envelope_metadata),
            secret: config.shared_secret_bytes().map(<[u8]>::to_vec),
            peer,
            registry: PeerRegistry::in_data_dir(&config.data(), config.bootstrap_peers.clone()),
            reliability: ReliabilityLayer::new(config.ack_timeout()),
            default_max_retries: config.default_max_retries,
            outgoing: DeltaSync::new(),
            clients: BTreeSet::new(),
            games: BTreeSet::new(),
            live_clients: BTreeSet::new(),
            pongs: HashMap::new(),
            inbox: VecDeque::new(),
            ledger: None,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Host or client.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// True for hosts.
    #[must_use]
    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    /// Bound socket address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// The peer a client sends to.
    #[must_use]
    pub const fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Points a client at a new peer.
    pub fn set_peer(&mut self, peer: Option<SocketAddr>) {
        self.peer = peer;
    }

    /// Connected clients (host).
    #[must_use]
    pub const fn clients(&self) -> &BTreeSet<SocketAddr> {
        &self.clients
    }

    /// Known game hosts.
    #[must_use]
    pub const fn known_games(&self) -> &BTreeSet<PeerAddress> {
        &self.games
    }

    /// Known live clients.
    #[must_use]
    pub const fn live_clients(&self) -> &BTreeSet<PeerAddress> {
        &self.live_clients
    }

    /// The persistent peer list.
    #[must_use]
    pub const fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    /// Reliable-delivery bookkeeping.
    #[must_use]
    pub const fn reliability(&self) -> &ReliabilityLayer {
        &self.reliability
    }

    /// Outgoing delta state.
    #[must_use]
    pub const fn delta_sync(&self) -> &DeltaSync {
        &self.outgoing
    }

    /// Socket statistics.
    #[must_use]
    pub const fn stats(&self) -> &TrafficStats {
        self.transport.stats()
    }

    // =========================================================================
    // Sending
    // =========================================================================

    /// Sends one message to `to`, unreliably.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::PayloadTooLarge`] or the socket error.
    pub fn send_to(&mut self, message: impl Into<Message>, to: SocketAddr) -> MeshResult<()> {
        let datagram = self.encode_frame(&Frame::new(message.into()))?;
        self.send_datagram(&datagram, to)
    }

    /// Sends `payload` to every connected client (host) or to the peer (client).
    ///
    /// A host logs and skips destinations that fail.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::NoDestination`] for a client without a peer,
    /// [`MeshError::PayloadTooLarge`], or a client's socket error.
    pub fn send_state(&mut self, payload: &StateSnapshot) -> MeshResult<()> {
        let datagram = self.encode_frame(&Frame::new(Message::Payload(payload.clone())))?;

        match self.role {
            Role::Host => {
                for client in self.clients.clone() {
                    if let Err(e) = self.send_datagram(&datagram, client) {
                        tracing::warn!(%client, error = %e, "send to client failed");
                    }
                }
                Ok(())
            }
            Role::Client => {
                let peer = self.peer.ok_or(MeshError::NoDestination)?;
                self.send_datagram(&datagram, peer)
            }
        }
    }

    /// Diffs `snapshot` against the last one sent and sends the delta.
    ///
    /// Returns the delta.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_state`].
    pub fn send_snapshot(&mut self, snapshot: &StateSnapshot) -> MeshResult<StateSnapshot> {
        let delta = self.outgoing.encode(snapshot);
        self.send_state(&delta)?;
        Ok(delta)
    }

    /// Sends `message` with `reliable: true` and a fresh `seq`, and tracks it
    /// until acked.
    ///
    /// `dest` of `None` means every connected client (host) or the peer
    /// (client); all of them share the returned sequence number.
    /// `max_retries` of `None` uses the configured default. `importance`
    /// divides the ack timeout.
    ///
    /// A payload's own `seq` field is replaced by the transport's, so delta
    /// streams should go through [`Self::send_snapshot`] instead.
    ///
    /// Delivery is at-least-once. A resend that crosses a late ack arrives
    /// again and [`Self::poll`] returns every copy, so receivers applying
    /// non-idempotent actions should carry their own id in the payload.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::NoDestination`] for a client without a peer or a
    /// host without clients, or [`MeshError::PayloadTooLarge`]. Socket errors
    /// are logged; the entry stays pending and is retried.
    pub fn send_reliable(
        &mut self,
        message: impl Into<Message>,
        dest: Option<SocketAddr>,
        max_retries: Option<u32>,
        importance: u32,
    ) -> MeshResult<u64> {
        let destinations = match dest {
            Some(addr) => vec![addr],
            None => self.default_destinations()?,
        };
        if destinations.is_empty() {
            return Err(MeshError::NoDestination);
        }

        let seq = self.reliability.next_seq();
        let datagram = self.encode_frame(&Frame::reliable(message.into(), seq))?;
        let retries = max_retries.unwrap_or(self.default_max_retries);
        let now = Instant::now();

        for to in destinations {
            self.reliability.track(to, seq, datagram.clone(), retries, importance, now);
            if let Err(e) = self.send_datagram(&datagram, to) {
                tracing::debug!(%to, seq, error = %e, "reliable send failed, will retry");
            }
        }

        Ok(seq)
    }

    /// Resends overdue reliable messages. Returns how many were resent.
    pub fn process_reliable(&mut self) -> usize {
        self.process_reliable_at(Instant::now())
    }

    /// [`Self::process_reliable`] against an explicit clock.
    pub fn process_reliable_at(&mut self, now: Instant) -> usize {
        let resends = self.reliability.due_resends(now);
        let count = resends.len();

        for (to, datagram) in resends {
            self.transport.record_resent();
            if let Err(e) = self.send_datagram(&datagram, to) {
                tracing::debug!(%to, error = %e, "resend failed");
            }
        }

        count
    }

    /// Sends `announce` with our views of games and clients.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to`].
    pub fn announce(&mut self, to: SocketAddr) -> MeshResult<()> {
        let message = ControlMessage::Announce {
            games: self.games.iter().cloned().collect(),
            clients: self.live_clients.iter().cloned().collect(),
        };
        self.send_to(message, to)
    }

    /// Registers this node as a game host with `router`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to`].
    pub fn register_game(&mut self, router: SocketAddr) -> MeshResult<()> {
        self.send_to(ControlMessage::Register, router)
    }

    /// Registers this node as a live client with `router`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to`].
    pub fn join_router(&mut self, router: SocketAddr) -> MeshResult<()> {
        self.send_to(ControlMessage::ClientJoin, router)
    }

    /// Asks `router` for game hosts. The reply lands in [`Self::known_games`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to`].
    pub fn find_games(&mut self, router: SocketAddr) -> MeshResult<()> {
        self.send_to(ControlMessage::Find, router)
    }

    /// Asks `router` for live clients. The reply lands in [`Self::live_clients`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to`].
    pub fn list_clients(&mut self, router: SocketAddr) -> MeshResult<()> {
        self.send_to(ControlMessage::ListClients, router)
    }

    // =========================================================================
    // Ledger gossip
    // =========================================================================

    /// Lets the node answer `chain_request` and merge `chain_update`.
    pub fn attach_ledger(&mut self, ledger: Ledger) {
        self.ledger = Some(ledger);
    }

    /// The attached ledger.
    #[must_use]
    pub const fn ledger(&self) -> Option<&Ledger> {
        self.ledger.as_ref()
    }

    /// Sends our chain to `to`. Returns `false` if no ledger is attached.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::PayloadTooLarge`] once the chain outgrows a
    /// datagram, or the socket error.
    pub fn share_chain(&mut self, to: SocketAddr) -> MeshResult<bool> {
        let Some(ledger) = &self.ledger else {
            return Ok(false);
        };
        let chain = serde_json::to_value(ledger.chain()).map_err(std::io::Error::from)?;
        self.send_to(ControlMessage::ChainUpdate { chain }, to)?;
        Ok(true)
    }

    /// Asks `to` for its chain.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_to`].
    pub fn request_chain(&mut self, to: SocketAddr) -> MeshResult<()> {
        self.send_to(ControlMessage::ChainRequest, to)
    }

    // =========================================================================
    // Receiving
    // =========================================================================

    /// Drains the socket, handles control traffic, and returns application
    /// payloads in arrival order. Never blocks, never fails: bad datagrams
    /// are dropped.
    pub fn poll(&mut self) -> Vec<(SocketAddr, StateSnapshot)> {
        self.receive_pending();
        self.inbox.drain(..).collect()
    }

    /// Handles everything waiting on the socket, queueing payloads.
    fn receive_pending(&mut self) {
        while let Some((data, from)) = self.transport.recv() {
            let datagram = data.to_vec();
            self.handle_datagram(&datagram, from);
        }
    }

    fn handle_datagram(&mut self, datagram: &[u8], from: SocketAddr) {
        let Some(frame) = open_frame(&self.codec, self.secret.as_deref(), datagram) else {
            tracing::trace!(%from, len = datagram.len(), "dropped datagram");
            self.transport.record_dropped();
            return;
        };

        if frame.reliable {
            if let Some(seq) = frame.seq {
                self.reply(from, ControlMessage::Ack { seq });
            }
        }

        match frame.message {
            Message::Control(control) => self.dispatch(control, from),
            Message::Payload(payload) => {
                if self.is_host() && self.clients.insert(from) {
                    tracing::debug!(%from, "client connected");
                }
                self.inbox.push_back((from, payload));
            }
        }
    }

    fn dispatch(&mut self, control: ControlMessage, from: SocketAddr) {
        match (self.role, control) {
            (_, ControlMessage::Ack { seq }) => {
                self.reliability.acknowledge(from, seq);
            }
            (_, ControlMessage::Pong { nonce }) => {
                self.pongs.insert(nonce, Instant::now());
            }
            (_, ControlMessage::Games { games }) => self.games.extend(games),
            (_, ControlMessage::Clients { clients }) => self.live_clients.extend(clients),
            (_, ControlMessage::ChainRequest) => {
                if let Err(e) = self.share_chain(from) {
                    tracing::warn!(%from, error = %e, "chain share failed");
                }
            }
            (_, ControlMessage::ChainUpdate { chain }) => self.merge_remote_chain(&chain, from),

            (Role::Host, ControlMessage::Discover) => self.reply(from, ControlMessage::Host),
            (Role::Host, ControlMessage::Announce { games, clients }) => {
                self.remember_peer(from);
                self.clients.insert(from);
                self.games.extend(games);
                self.live_clients.extend(clients);
                self.reply(from, ControlMessage::Games { games: self.games.iter().cloned().collect() });
                self.reply(from, ControlMessage::Clients { clients: self.live_clients.iter().cloned().collect() });
            }
            (Role::Host, ControlMessage::Register) => {
                self.games.insert(from.into());
                let games = self.games.iter().cloned().collect();
                self.gossip(&ControlMessage::GamesUpdate { games }, from);
            }
            (Role::Host, ControlMessage::ClientJoin) => {
                self.live_clients.insert(from.into());
                let clients = self.live_clients.iter().cloned().collect();
                self.gossip(&ControlMessage::ClientsUpdate { clients }, from);
            }
            (Role::Host, ControlMessage::Find) => {
                self.reply(from, ControlMessage::Games { games: self.games.iter().cloned().collect() });
            }
            (Role::Host, ControlMessage::ListClients) => {
                self.reply(from, ControlMessage::Clients { clients: self.live_clients.iter().cloned().collect() });
            }
            (Role::Host, ControlMessage::GamesUpdate { games }) => self.games.extend(games),
            (Role::Host, ControlMessage::ClientsUpdate { clients }) => self.live_clients.extend(clients),
            (Role::Host, ControlMessage::Ping { nonce }) => self.reply(from, ControlMessage::Pong { nonce }),

            (Role::Client, ControlMessage::Announce { .. } | ControlMessage::Host) => self.remember_peer(from),

            (role, other) => tracing::trace!(?role, ?other, %from, "ignored control message"),
        }
    }

    fn merge_remote_chain(&self, chain: &Value, from: SocketAddr) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        match ledger.merge_chain_value(chain) {
            Ok(true) => tracing::info!(%from, "merged remote chain"),
            Ok(false) => tracing::debug!(%from, "remote chain not adopted"),
            Err(e) => tracing::warn!(%from, error = %e, "failed to store merged chain"),
        }
    }

    fn remember_peer(&self, from: SocketAddr) {
        if let Err(e) = self.registry.add(from.into()) {
            tracing::warn!(%from, error = %e, "failed to persist peer");
        }
    }

    /// Sends `message` to every registry peer except ourselves and `origin`.
    fn gossip(&mut self, message: &ControlMessage, origin: SocketAddr) {
        let local = self.local_addr();
        for peer in self.registry.load() {
            let Ok(addr) = peer.resolve() else {
                tracing::debug!(%peer, "skipping unresolvable peer");
                continue;
            };
            if addr == local || addr == origin {
                continue;
            }
            if let Err(e) = self.send_to(message.clone(), addr) {
                tracing::debug!(%addr, error = %e, "gossip send failed");
            }
        }
    }

    /// Best-effort control reply.
    fn reply(&mut self, to: SocketAddr, message: ControlMessage) {
        if let Err(e) = self.send_to(message, to) {
            tracing::debug!(%to, error = %e, "reply failed");
        }
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn default_destinations(&self) -> MeshResult<Vec<SocketAddr>> {
        match self.role {
            Role::Host => Ok(self.clients.iter().copied().collect()),
            Role::Client => self.peer.map(|p| vec![p]).ok_or(MeshError::NoDestination),
        }
    }

    fn encode_frame(&self, frame: &Frame) -> MeshResult<Vec<u8>> {
        seal_frame(&self.codec, self.secret.as_deref(), frame)
    }

    fn send_datagram(&mut self, datagram: &[u8], to: SocketAddr) -> MeshResult<()> {
        self.transport.send_to(datagram, to)?;
        Ok(())
    }
}

/// Signs (if `secret`), encodes and size-checks a frame.
fn seal_frame(codec: &PacketCodec, secret: Option<&[u8]>, frame: &Frame) -> MeshResult<Vec<u8>> {
    let mut object = frame.to_object();
    if let Some(secret) = secret {
        signing::sign(secret, &mut object);
    }

    let datagram = codec.encode(&Value::Object(object))?;
    if datagram.len() > RECV_BUFFER_SIZE {
        return Err(MeshError::PayloadTooLarge {
            size: datagram.len(),
            max: RECV_BUFFER_SIZE,
        });
    }
    Ok(datagram)
}

/// Decodes, verifies (if `secret`) and parses a datagram.
fn open_frame(codec: &PacketCodec, secret: Option<&[u8]>, datagram: &[u8]) -> Option<Frame> {
    let Value::Object(object) = codec.decode(datagram)? else {
        return None;
    };
    if let Some(secret) = secret {
        if !signing::verify(secret, &object) {
            tracing::debug!("dropped unsigned or mis-signed message");
            return None;
        }
    }
    Frame::from_object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MAX_MESSAGE_SIZE;
    use serde_json::json;

    fn loopback_host(dir: &tempfile::TempDir) -> MeshNode {
        let mut config = MeshConfig::host(0);
        config.bind_address = "127.0.0.1".into();
        config.data_dir = dir.path().to_path_buf();
        config.bootstrap_peers = Vec::new();
        MeshNode::bind(&config).unwrap()
    }

    #[test]
    fn test_frame_seal_open() {
        let codec = PacketCodec::default();
        let frame = Frame::reliable(ControlMessage::Find.into(), 4);
        let datagram = seal_frame(&codec, Some(&b"s"[..]), &frame).unwrap();

        assert_eq!(open_frame(&codec, Some(&b"s"[..]), &datagram), Some(frame.clone()));
        assert_eq!(open_frame(&codec, Some(&b"other"[..]), &datagram), None);
        // Unsigned receivers ignore the signature
        assert_eq!(open_frame(&codec, None, &datagram), Some(frame));
    }

    #[test]
    fn test_unsigned_rejected_by_signed_node() {
        let codec = PacketCodec::default();
        let datagram = seal_frame(&codec, None, &Frame::new(ControlMessage::Find.into())).unwrap();
        assert_eq!(open_frame(&codec, Some(&b"s"[..]), &datagram), None);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let codec = PacketCodec::default();
        // Random-looking data does not compress
        let noise: String = (0..20_000u32)
            .map(|i| char::from(b'!' + u8::try_from(i.wrapping_mul(2_654_435_761) >> 26).unwrap()))
            .collect();
        let mut payload = StateSnapshot::new();
        payload.insert("noise".into(), json!(noise));

        let err = seal_frame(&codec, None, &Frame::new(Message::Payload(payload))).unwrap_err();
        assert!(matches!(err, MeshError::PayloadTooLarge { max: RECV_BUFFER_SIZE, .. }));
    }

    #[test]
    fn test_client_without_peer_has_no_destination() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = MeshConfig::default();
        config.bind_address = "127.0.0.1".into();
        config.data_dir = dir.path().to_path_buf();
        let mut client = MeshNode::bind(&config).unwrap();

        let err = client.send_state(&StateSnapshot::new()).unwrap_err();
        assert!(matches!(err, MeshError::NoDestination));
        assert!(matches!(
            client.send_reliable(StateSnapshot::new(), None, None, 1),
            Err(MeshError::NoDestination)
        ));
    }

    #[test]
    fn test_host_without_clients_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = loopback_host(&dir);

        host.send_state(&StateSnapshot::new()).unwrap();
        assert_eq!(host.stats().packets_sent, 0);
        assert!(host.poll().is_empty());
    }

    #[test]
    fn test_reliable_send_from_lonely_host_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = loopback_host(&dir);

        let err = host.send_reliable(StateSnapshot::new(), None, None, 1).unwrap_err();
        assert!(matches!(err, MeshError::NoDestination));
        assert_eq!(host.reliability().pending_count(), 0);
        assert_eq!(host.stats().packets_sent, 0);
    }

    #[test]
    fn test_compressible_oversized_payload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = loopback_host(&dir);
        let peer = host.local_addr();

        // Two MiB of one letter deflates to a few kilobytes
        let mut payload = StateSnapshot::new();
        payload.insert("blob".into(), json!("a".repeat(2 << 20)));

        let err = seal_frame(&PacketCodec::default(), None, &Frame::new(Message::Payload(payload.clone())))
            .unwrap_err();
        assert!(matches!(err, MeshError::PayloadTooLarge { max: MAX_MESSAGE_SIZE, .. }));

        assert!(matches!(
            host.send_reliable(payload, Some(peer), None, 1),
            Err(MeshError::PayloadTooLarge { .. })
        ));
        assert_eq!(host.reliability().pending_count(), 0);
        assert_eq!(host.stats().packets_sent, 0);
    }

    #[test]
    fn test_garbage_and_resends_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = loopback_host(&dir);
        let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();

        silent.send_to(b"not an envelope", host.local_addr()).unwrap();
        let start = Instant::now();
        while host.stats().dropped == 0 && start.elapsed() < Duration::from_secs(2) {
            host.poll();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(host.stats().dropped, 1);

        let sent_at = Instant::now();
        host.send_reliable(StateSnapshot::new(), Some(silent.local_addr().unwrap()), Some(2), 1)
            .unwrap();
        assert_eq!(host.process_reliable_at(sent_at + Duration::from_secs(10)), 1);
        assert_eq!(host.stats().resent, 1);
    }
}
