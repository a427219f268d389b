//! # State Synchronization
//!
//! Sparse state diffs for per-tick game state.
//!
//! ## Delta Encoding
//!
//! ```text
//! encode({x:1, y:2})  -> {x:1, y:2, seq:1}
//! encode({x:1, y:3})  -> {y:3, seq:2}
//! apply({y:3, seq:2}) on {x:1, y:2} -> {x:1, y:3}
//! ```
//!
//! Deltas only save bandwidth. They carry no ordering guarantee: a dropped
//! or reordered delta leaves stale fields until the key changes again.

mod clock;

pub use clock::ClockOffset;

use serde_json::{Map, Value};

/// A mapping of field name to value.
pub type StateSnapshot = Map<String, Value>;

/// Key carrying the sender's sequence number inside a delta.
pub const SEQ_KEY: &str = "seq";

/// Delta encoder/decoder for one stream of snapshots.
///
/// A node uses the same instance both to encode its own snapshots and to
/// apply deltas it receives; the two directions share `last` and `seq`.
#[derive(Clone, Debug, Default)]
pub struct DeltaSync {
    last: StateSnapshot,
    seq: u64,
}

impl DeltaSync {
    /// Creates an empty sync at sequence 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sequence number.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Last full snapshot, sent or merged.
    #[must_use]
    pub const fn snapshot(&self) -> &StateSnapshot {
        &self.last
    }

    /// Returns the fields of `snapshot` that changed since the previous call.
    ///
    /// Keys absent from the previous snapshot count as changed. The result
    /// always carries `seq`.
    pub fn encode(&mut self, snapshot: &StateSnapshot) -> StateSnapshot {
        self.seq += 1;

        let mut delta: StateSnapshot = snapshot
            .iter()
            .filter(|(key, value)| self.last.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        delta.insert(SEQ_KEY.to_owned(), Value::from(self.seq));

        self.last = snapshot.clone();
        delta
    }

    /// Merges `delta` into the running snapshot and returns the result.
    ///
    /// A numeric `seq` replaces the tracked sequence number unconditionally.
    pub fn apply(&mut self, delta: &StateSnapshot) -> StateSnapshot {
        for (key, value) in delta {
            if key == SEQ_KEY {
                if let Some(seq) = value.as_u64() {
                    self.seq = seq;
                }
                continue;
            }
            self.last.insert(key.clone(), value.clone());
        }
        self.last.clone()
    }
}
