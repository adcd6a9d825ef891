//! Resource request gossip message.

use crate::NetworkMessage;
use citygate_types::{ProcessId, Request, ResourceId, Timestamp};
use serde::{Deserialize, Serialize};

/// Announces that `requester` wants `resource`, stamped at `timestamp`.
/// Every peer must eventually answer with an ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGossip {
    /// The request being gossiped
    pub request: Request,
}

impl RequestGossip {
    /// Create a new request gossip message.
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    /// Get the inner request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Consume and return the inner request.
    pub fn into_request(self) -> Request {
        self.request
    }

    /// The requesting process.
    pub fn requester(&self) -> ProcessId {
        self.request.requester
    }

    /// The Lamport stamp of the request.
    pub fn timestamp(&self) -> Timestamp {
        self.request.timestamp
    }

    /// The requested resource.
    pub fn resource(&self) -> ResourceId {
        self.request.resource
    }
}

impl NetworkMessage for RequestGossip {
    fn message_type_id() -> &'static str {
        "city.request"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_gossip_accessors() {
        let request = Request::new(ProcessId(2), Timestamp(5), ResourceId(1));
        let gossip = RequestGossip::new(request);
        assert_eq!(gossip.requester(), ProcessId(2));
        assert_eq!(gossip.timestamp(), Timestamp(5));
        assert_eq!(gossip.resource(), ResourceId(1));
        assert_eq!(gossip.into_request(), request);
    }
}
