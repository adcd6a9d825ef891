//! Arbitration state machine.
//!
//! This crate implements the distributed mutual-exclusion protocol for M
//! resources ("cities") shared by N peers. It is a Ricart-Agrawala variant:
//! a process enters a city once every peer has acknowledged its request, and
//! requests are totally ordered by `(Lamport timestamp, process id)`. On top of
//! that, every release starts a cooldown that the releasing process owns and
//! replicates to its peers.
//!
//! # Architecture
//!
//! The arbiter processes events synchronously:
//!
//! - `on_tick` → Advance owned cooldowns, count down the hold, maybe request
//! - `on_request` → Ack immediately, or defer when our own claim has priority
//! - `on_ack` → Collect acks, enter or wait once N-1 have arrived
//! - `on_cooldown_update` → Merge a replica update, enter if we were waiting
//!
//! All I/O is performed by the runner via returned `Action`s.

mod config;
mod cooldown;
mod deferred;
mod policy;
mod registry;
mod state;

pub use config::ArbiterConfig;
pub use cooldown::{CooldownPropagator, MergeOutcome};
pub use deferred::{DeferredQueue, DeferredQueueError, DeferredQueues};
pub use policy::{Policy, PolicyConfig, RandomPolicy};
pub use registry::{ResourceRegistry, ResourceState};
pub use state::ArbiterState;
