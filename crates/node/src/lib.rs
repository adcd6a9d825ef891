//! Node state machine.
//!
//! This crate composes the arbiter with the local tick timer into the state
//! machine a runner drives.

mod config;
mod state;

pub use config::NodeConfig;
pub use state::NodeIndex;
pub use state::NodeStateMachine;
