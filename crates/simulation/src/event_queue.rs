//! Ordering key for the simulation event queue.

use crate::NodeIndex;
use citygate_core::{Event, EventPriority};
use std::time::Duration;

/// Key of a scheduled event.
///
/// Events are processed in `(time, priority, node, sequence)` order. The
/// sequence number is assigned at scheduling time, so two events for the same
/// node at the same instant and priority run in the order they were scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    /// Simulated time at which the event fires.
    pub time: Duration,
    /// Network traffic before timers at the same instant.
    pub priority: EventPriority,
    /// Node that handles the event.
    pub node: NodeIndex,
    /// Global scheduling counter.
    pub sequence: u64,
}

impl EventKey {
    /// Build the key for `event` delivered to `node` at `time`.
    pub fn new(time: Duration, event: &Event, node: NodeIndex, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            node,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citygate_messages::AckResponse;
    use citygate_types::{ProcessId, ResourceId, Timestamp};

    #[test]
    fn test_messages_run_before_tick_at_same_instant() {
        let ack = Event::AckReceived {
            ack: AckResponse::new(ProcessId(1), Timestamp(1), ResourceId(0)),
        };
        let at = Duration::from_millis(100);
        let tick = EventKey::new(at, &Event::Tick, 0, 1);
        let message = EventKey::new(at, &ack, 0, 2);
        assert!(message < tick);
    }

    #[test]
    fn test_sequence_breaks_remaining_ties() {
        let at = Duration::from_millis(5);
        let first = EventKey::new(at, &Event::Tick, 3, 10);
        let second = EventKey::new(at, &Event::Tick, 3, 11);
        assert!(first < second);
        assert!(EventKey::new(at, &Event::Tick, 2, 99) < first);
    }
}
