//! Simulator errors.

use citygate_types::TopologyError;
use thiserror::Error;

/// Errors raised while setting up a simulation.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("Histogram setup failed: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
}
