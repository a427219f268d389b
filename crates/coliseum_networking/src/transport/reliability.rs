//! # Reliable Delivery
//!
//! Bookkeeping for messages that want an ack.
//!
//! ```text
//! send_reliable ─► pending[(dest, seq)] = {datagram, sent_at, retries_left, importance}
//!
//! every process step, for each entry older than ack_timeout / importance:
//!     retries_left == 0  ─► drop
//!     otherwise          ─► resend, retries_left -= 1, sent_at = now
//!
//! ack{seq} from dest ─► remove pending[(dest, seq)]
//! ```
//!
//! Exhaustion is silent. Callers that care check [`ReliabilityLayer::is_pending`].

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One in-flight reliable send.
#[derive(Clone, Debug)]
pub struct PendingAck {
    /// Encoded datagram, resent verbatim.
    pub datagram: Vec<u8>,
    /// Time of the last (re)send.
    pub sent_at: Instant,
    /// Resends left before the entry is dropped.
    pub retries_left: u32,
    /// Divides the ack timeout; higher resends sooner. At least 1.
    pub importance: u32,
}

/// Pending acks keyed by `(destination, seq)`.
#[derive(Debug)]
pub struct ReliabilityLayer {
    /// Entries awaiting an ack.
    pending: BTreeMap<(SocketAddr, u64), PendingAck>,
    /// Last sequence number handed out.
    sequence: u64,
    /// Base resend timeout.
    ack_timeout: Duration,
}

impl ReliabilityLayer {
    /// Creates a layer with the given base timeout.
    #[must_use]
    pub const fn new(ack_timeout: Duration) -> Self {
        Self {
            pending: BTreeMap::new(),
            sequence: 0,
            ack_timeout,
        }
    }

    /// Next sequence number. Strictly increasing, starting at 1.
    pub fn next_seq(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Starts tracking a datagram sent to `dest` at `now`.
    pub fn track(
        &mut self,
        dest: SocketAddr,
        seq: u64,
        datagram: Vec<u8>,
        max_retries: u32,
        importance: u32,
        now: Instant,
    ) {
        self.pending.insert(
            (dest, seq),
            PendingAck {
                datagram,
                sent_at: now,
                retries_left: max_retries,
                importance: importance.max(1),
            },
        );
    }

    /// Removes the entry acknowledged by `from`. Returns whether one existed.
    pub fn acknowledge(&mut self, from: SocketAddr, seq: u64) -> bool {
        self.pending.remove(&(from, seq)).is_some()
    }

    /// Datagrams due for resend at `now`.
    ///
    /// Decrements the retry budget of each returned entry and drops entries
    /// that were due with no retries left.
    pub fn due_resends(&mut self, now: Instant) -> Vec<(SocketAddr, Vec<u8>)> {
        let timeout = self.ack_timeout;
        let mut resends = Vec::new();

        self.pending.retain(|&(dest, seq), entry| {
            if now.saturating_duration_since(entry.sent_at) <= timeout / entry.importance {
                return true;
            }
            if entry.retries_left == 0 {
                tracing::debug!(%dest, seq, "reliable send exhausted");
                return false;
            }
            entry.retries_left -= 1;
            entry.sent_at = now;
            resends.push((dest, entry.datagram.clone()));
            true
        });

        resends
    }

    /// Looks up an entry.
    #[must_use]
    pub fn get(&self, dest: SocketAddr, seq: u64) -> Option<&PendingAck> {
        self.pending.get(&(dest, seq))
    }

    /// True while `(dest, seq)` awaits an ack.
    #[must_use]
    pub fn is_pending(&self, dest: SocketAddr, seq: u64) -> bool {
        self.pending.contains_key(&(dest, seq))
    }

    /// Number of entries awaiting an ack.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Base resend timeout.
    #[must_use]
    pub const fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_sequence_is_monotonic() {
        let mut layer = ReliabilityLayer::new(TIMEOUT);
        assert_eq!(layer.next_seq(), 1);
        assert_eq!(layer.next_seq(), 2);
    }

    #[test]
    fn test_importance_shortens_timeout() {
        let mut layer = ReliabilityLayer::new(TIMEOUT);
        let start = Instant::now();
        layer.track(addr(1), 1, b"x".to_vec(), 1, 2, start);

        // Not yet due
        assert!(layer.due_resends(start + Duration::from_millis(200)).is_empty());

        let resends = layer.due_resends(start + Duration::from_millis(260));
        assert_eq!(resends, vec![(addr(1), b"x".to_vec())]);
        assert_eq!(layer.get(addr(1), 1).unwrap().retries_left, 0);

        assert!(layer.acknowledge(addr(1), 1));
        assert_eq!(layer.pending_count(), 0);
    }

    #[test]
    fn test_exhausted_entries_are_dropped() {
        let mut layer = ReliabilityLayer::new(TIMEOUT);
        let start = Instant::now();
        layer.track(addr(1), 1, b"x".to_vec(), 1, 1, start);

        let t1 = start + Duration::from_millis(501);
        assert_eq!(layer.due_resends(t1).len(), 1);

        let t2 = t1 + Duration::from_millis(501);
        assert!(layer.due_resends(t2).is_empty());
        assert!(!layer.is_pending(addr(1), 1));
    }

    #[test]
    fn test_ack_must_match_destination() {
        let mut layer = ReliabilityLayer::new(TIMEOUT);
        let now = Instant::now();
        layer.track(addr(1), 7, Vec::new(), 3, 1, now);
        layer.track(addr(2), 7, Vec::new(), 3, 1, now);

        assert!(!layer.acknowledge(addr(3), 7));
        assert!(layer.acknowledge(addr(1), 7));
        assert!(layer.is_pending(addr(2), 7));
        assert!(!layer.acknowledge(addr(1), 7));
    }

    #[test]
    fn test_zero_importance_is_clamped() {
        let mut layer = ReliabilityLayer::new(TIMEOUT);
        let now = Instant::now();
        layer.track(addr(1), 1, Vec::new(), 3, 0, now);
        assert_eq!(layer.get(addr(1), 1).unwrap().importance, 1);
    }
}
