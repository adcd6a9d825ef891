//! Arbitration phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a process in the arbitration protocol.
///
/// ```text
/// IDLE ──request──► REQUESTING ──N-1 acks, city free──► IN_RESOURCE ──release──► IDLE
///                        │                                   ▲
///                        └──N-1 acks, city cooling──► WAITING┘ (cooldown reaches 0)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Not interested in any resource.
    #[default]
    Idle,
    /// Request broadcast, collecting acks.
    Requesting,
    /// Holding the resource.
    InResource,
    /// Quorum collected, waiting for the resource's cooldown to end.
    Waiting,
}

impl Phase {
    /// Check whether a process in this phase holds a claim on its resource.
    ///
    /// A claim makes the process compete with incoming requests for the same
    /// resource instead of acknowledging them unconditionally.
    pub fn holds_claim(self) -> bool {
        matches!(self, Phase::Requesting | Phase::InResource | Phase::Waiting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::Requesting => write!(f, "REQUESTING"),
            Phase::InResource => write!(f, "IN_RESOURCE"),
            Phase::Waiting => write!(f, "WAITING"),
        }
    }
}
