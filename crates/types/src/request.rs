//! Resource requests and their priority order.

use crate::{ProcessId, ResourceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A claim on a resource.
///
/// Requests are totally ordered by `(timestamp, requester)`: the older stamp
/// wins and equal stamps go to the lower process id. This single order decides
/// both who is granted a resource and the order deferred requests are drained.
/// The resource is not part of the order; requests are only ever compared
/// against requests for the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    /// Process asking for the resource.
    pub requester: ProcessId,
    /// Lamport stamp taken when the request was broadcast.
    pub timestamp: Timestamp,
    /// The resource being requested.
    pub resource: ResourceId,
}

impl Request {
    /// Create a new request.
    pub fn new(requester: ProcessId, timestamp: Timestamp, resource: ResourceId) -> Self {
        Self {
            requester,
            timestamp,
            resource,
        }
    }

    /// The priority key, `(timestamp, requester)`. Smaller is higher priority.
    pub fn priority(&self) -> (Timestamp, ProcessId) {
        (self.timestamp, self.requester)
    }

    /// Check whether this request must be served before `other`.
    pub fn has_priority_over(&self, other: &Request) -> bool {
        self.priority() < other.priority()
    }
}

impl Ord for Request {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority()
            .cmp(&other.priority())
            .then(self.resource.cmp(&other.resource))
    }
}

impl PartialOrd for Request {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
