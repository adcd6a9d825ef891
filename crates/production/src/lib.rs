//! Production runner for Citygate nodes.
//!
//! Hosts one [`NodeStateMachine`](citygate_node::NodeStateMachine) per OS
//! process and connects it to its peers:
//!
//! - [`Transport`]: reliable, per-peer FIFO frame delivery
//!   ([`ChannelTransport`] in-process, [`TcpTransport`] over TCP)
//! - [`MessageRouter`]: encodes outbound messages, turns a broadcast into N-1
//!   sends, and decodes and validates every inbound frame
//! - [`ProductionRunner`]: the tokio event loop, waiting on whichever comes
//!   first of the next inbound batch and the next tick deadline
//!
//! Malformed or mistyped inbound traffic is fatal: the runner stops with an
//! error instead of guessing.

pub mod config;
pub mod network;
mod router;
mod runner;

pub use config::{ConfigError, PeerConfig, ProductionConfig};
pub use network::{ChannelTransport, CodecError, TcpTransport, Transport, TransportError};
pub use router::{MessageRouter, RouterError};
pub use runner::{PhaseEvent, ProductionRunner, RunnerError};
