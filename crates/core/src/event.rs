//! Inputs to the state machine.

use citygate_messages::{AckResponse, CooldownUpdateGossip, Message, RequestGossip};
use citygate_types::ProcessId;

/// Ordering priority for events scheduled at the same instant.
///
/// Lower values are processed first. Messages that arrive at the same instant
/// as a tick are handled before it, so the tick sees the freshest state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventPriority {
    /// Inbound network traffic.
    Network = 0,
    /// Timer expiry.
    Timer = 1,
}

/// All possible inputs to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The local loop ticked.
    Tick,

    /// A peer asked for a resource.
    RequestReceived { gossip: RequestGossip },

    /// A peer acknowledged our request.
    AckReceived { ack: AckResponse },

    /// A cooldown owner replicated its counter.
    CooldownUpdateReceived { update: CooldownUpdateGossip },
}

impl Event {
    /// Convert a decoded inbound message into an event.
    pub fn from_message(message: Message) -> Self {
        match message {
            Message::Request(gossip) => Event::RequestReceived { gossip },
            Message::Ack(ack) => Event::AckReceived { ack },
            Message::CooldownUpdate(update) => Event::CooldownUpdateReceived { update },
        }
    }

    /// Get the priority of this event.
    pub fn priority(&self) -> EventPriority {
        match self {
            Event::Tick => EventPriority::Timer,
            _ => EventPriority::Network,
        }
    }

    /// The peer that caused this event, if it came from the network.
    pub fn origin(&self) -> Option<ProcessId> {
        match self {
            Event::Tick => None,
            Event::RequestReceived { gossip } => Some(gossip.requester()),
            Event::AckReceived { ack } => Some(ack.sender),
            Event::CooldownUpdateReceived { update } => Some(update.sender),
        }
    }

    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Tick => "Tick",
            Event::RequestReceived { .. } => "RequestReceived",
            Event::AckReceived { .. } => "AckReceived",
            Event::CooldownUpdateReceived { .. } => "CooldownUpdateReceived",
        }
    }
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Event::from_message(message)
    }
}
