//! Arbiter configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the arbitration state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Maximum deferred requests buffered per resource.
    ///
    /// `None` leaves the queues unbounded. With a bound, a request arriving at
    /// a full queue is never acknowledged: there is no retransmission, so the
    /// requester starves. Only set this when that trade-off is acceptable.
    pub max_deferred_per_resource: Option<usize>,
}

impl ArbiterConfig {
    /// Create a config with a bounded deferred queue per resource.
    pub fn with_deferred_capacity(capacity: usize) -> Self {
        Self {
            max_deferred_per_resource: Some(capacity),
        }
    }
}
