//! Cooldown update gossip message.

use crate::NetworkMessage;
use citygate_types::{ProcessId, ResourceId, Timestamp};
use serde::{Deserialize, Serialize};

/// Replicates the cooldown counter of a resource.
///
/// Only the current owner of a cooldown produces these: once when it starts
/// (on release) and once after every decrement. The update that reaches zero
/// carries `owner = None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownUpdateGossip {
    /// Process that produced the update.
    pub sender: ProcessId,
    /// Resource whose cooldown changed.
    pub resource: ResourceId,
    /// Ticks left before the resource can be entered again.
    pub remaining_ticks: u64,
    /// Process holding decrement authority, `None` once the cooldown is over.
    pub owner: Option<ProcessId>,
    /// Lamport stamp of the update.
    pub timestamp: Timestamp,
}

impl CooldownUpdateGossip {
    /// Create a new cooldown update.
    pub fn new(
        sender: ProcessId,
        resource: ResourceId,
        remaining_ticks: u64,
        owner: Option<ProcessId>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            sender,
            resource,
            remaining_ticks,
            owner,
            timestamp,
        }
    }

    /// Check whether this update marks the end of a cooldown.
    pub fn is_terminal(&self) -> bool {
        self.remaining_ticks == 0
    }

    /// Lamport stamp used to order updates from different owners.
    pub fn stamp(&self) -> (Timestamp, ProcessId) {
        (self.timestamp, self.sender)
    }
}

impl NetworkMessage for CooldownUpdateGossip {
    fn message_type_id() -> &'static str {
        "city.cooldown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_update() {
        let running = CooldownUpdateGossip::new(
            ProcessId(0),
            ResourceId(0),
            3,
            Some(ProcessId(0)),
            Timestamp(4),
        );
        let done = CooldownUpdateGossip::new(ProcessId(0), ResourceId(0), 0, None, Timestamp(7));
        assert!(!running.is_terminal());
        assert!(done.is_terminal());
        assert!(running.stamp() < done.stamp());
    }
}
