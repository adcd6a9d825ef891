//! Outputs of the state machine.

use crate::TimerId;
use citygate_messages::Message;
use citygate_types::{Phase, ProcessId, ResourceId, Timestamp};
use std::time::Duration;

/// Something the runner must do on behalf of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a message to a single peer.
    Send { to: ProcessId, message: Message },

    /// Send a message to every peer (N-1 point-to-point sends).
    Broadcast { message: Message },

    /// Arm (or re-arm) a timer.
    SetTimer { id: TimerId, duration: Duration },

    /// The process moved to a new phase.
    ///
    /// Runners use this for logging, metrics and invariant checks; it has no
    /// protocol effect.
    EmitPhaseChange {
        process: ProcessId,
        resource: Option<ResourceId>,
        from: Phase,
        to: Phase,
        clock: Timestamp,
    },
}

impl Action {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Send { .. } => "Send",
            Action::Broadcast { .. } => "Broadcast",
            Action::SetTimer { .. } => "SetTimer",
            Action::EmitPhaseChange { .. } => "EmitPhaseChange",
        }
    }
}
