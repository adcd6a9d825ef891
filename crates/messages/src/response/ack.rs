//! Acknowledgement reply.

use crate::NetworkMessage;
use citygate_types::{ProcessId, ResourceId, Timestamp};
use serde::{Deserialize, Serialize};

/// Grants the sender's consent for the requester to enter `resource`.
///
/// An ack does not name the request it answers: a process has at most one
/// outstanding request, so the resource is enough to match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    /// Process granting the request.
    pub sender: ProcessId,
    /// Sender's Lamport clock at the time of the reply.
    pub timestamp: Timestamp,
    /// Resource the ack applies to.
    pub resource: ResourceId,
}

impl AckResponse {
    /// Create a new ack.
    pub fn new(sender: ProcessId, timestamp: Timestamp, resource: ResourceId) -> Self {
        Self {
            sender,
            timestamp,
            resource,
        }
    }
}

impl NetworkMessage for AckResponse {
    fn message_type_id() -> &'static str {
        "city.ack"
    }
}
