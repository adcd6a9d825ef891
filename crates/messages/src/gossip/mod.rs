//! Gossip messages broadcast to every peer.
//!
//! Broadcast is expressed as N-1 point-to-point sends by the router.

mod cooldown_update;
mod request;

pub use cooldown_update::CooldownUpdateGossip;
pub use request::RequestGossip;
