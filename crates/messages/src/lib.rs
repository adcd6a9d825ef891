//! Network messages for the arbitration protocol.
//!
//! Three kinds of message exist, and every one of them carries its sender,
//! a Lamport timestamp and a resource id:
//!
//! | Kind | Sent by | Sent to |
//! |---|---|---|
//! | [`RequestGossip`] | process entering REQUESTING | all peers |
//! | [`AckResponse`] | process granting a request | the requester |
//! | [`CooldownUpdateGossip`] | the resource's cooldown owner | all peers |
//!
//! [`Message`] is the tagged union that travels on the wire.

pub mod gossip;
mod message;
pub mod response;

pub use gossip::{CooldownUpdateGossip, RequestGossip};
pub use message::{Message, MessageError};
pub use response::AckResponse;

/// A message type that can travel on the network.
pub trait NetworkMessage {
    /// Stable identifier of the message type, used in logs and frame headers.
    fn message_type_id() -> &'static str;
}
