//! Remote clock tracking for client-side prediction.

/// Offset between a remote clock and the local one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClockOffset {
    offset: i64,
}

impl ClockOffset {
    /// Zero offset.
    #[must_use]
    pub const fn new() -> Self {
        Self { offset: 0 }
    }

    /// Records a `(remote, local)` sample. The latest sample wins.
    pub fn update(&mut self, remote_time: i64, local_time: i64) {
        self.offset = remote_time.saturating_sub(local_time);
    }

    /// `remote - local` from the latest sample.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// Converts a remote timestamp to local time.
    #[must_use]
    pub const fn to_local(&self, remote_time: i64) -> i64 {
        remote_time.saturating_sub(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_round_trip() {
        let mut clock = ClockOffset::new();
        clock.update(1_500, 1_000);
        assert_eq!(clock.offset(), 500);
        assert_eq!(clock.to_local(2_000), 1_500);

        clock.update(900, 1_000);
        assert_eq!(clock.to_local(900), 1_000);
    }
}
