//! Core types for Citygate arbitration.
//!
//! This crate provides the leaf types shared by every other crate:
//!
//! - [`ProcessId`], [`ResourceId`], [`Timestamp`]: domain identifiers
//! - [`LamportClock`]: per-process logical clock
//! - [`Phase`]: where a process is in the arbitration protocol
//! - [`Request`]: a claim on a resource, totally ordered by `(timestamp, requester)`
//! - [`Topology`]: the bootstrap view of the peer group (N processes, M resources)

mod clock;
mod identifiers;
mod phase;
mod request;
mod topology;

pub use clock::LamportClock;
pub use identifiers::{ProcessId, ResourceId, Timestamp};
pub use phase::Phase;
pub use request::Request;
pub use topology::{StaticTopology, Topology, TopologyError};
