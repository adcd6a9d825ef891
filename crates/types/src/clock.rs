//! Lamport logical clock.

use crate::Timestamp;

/// Per-process Lamport counter.
///
/// The clock never decreases. Sending advances it by one and stamps the
/// outgoing message; receiving jumps past the sender's stamp so that any two
/// causally related events are ordered by timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LamportClock {
    current: Timestamp,
}

impl LamportClock {
    /// Create a clock starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a clock starting at a given value.
    pub fn starting_at(current: Timestamp) -> Self {
        Self { current }
    }

    /// Current value, without advancing.
    pub fn now(&self) -> Timestamp {
        self.current
    }

    /// Advance for a local send event and return the stamp to put on the message.
    pub fn tick_on_send(&mut self) -> Timestamp {
        self.current = self.current.next();
        self.current
    }

    /// Apply the Lamport receive rule: `local = max(local, msg_ts) + 1`.
    pub fn merge_on_receive(&mut self, msg_ts: Timestamp) -> Timestamp {
        self.current = self.current.max(msg_ts).next();
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_on_send_increments() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.tick_on_send(), Timestamp(1));
        assert_eq!(clock.tick_on_send(), Timestamp(2));
        assert_eq!(clock.now(), Timestamp(2));
    }

    #[test]
    fn test_merge_jumps_past_remote() {
        let mut clock = LamportClock::new();
        clock.merge_on_receive(Timestamp(10));
        assert_eq!(clock.now(), Timestamp(11));
    }

    #[test]
    fn test_merge_with_older_stamp_still_advances() {
        let mut clock = LamportClock::starting_at(Timestamp(20));
        clock.merge_on_receive(Timestamp(3));
        assert_eq!(clock.now(), Timestamp(21));
    }

    #[test]
    fn test_clock_never_decreases() {
        let mut clock = LamportClock::new();
        let mut last = clock.now();
        for ts in [5, 1, 9, 9, 0, 30, 2] {
            let after = clock.merge_on_receive(Timestamp(ts));
            assert!(after >= Timestamp(ts).next());
            assert!(after > last);
            last = after;
            let sent = clock.tick_on_send();
            assert!(sent > last);
            last = sent;
        }
    }
}
