//! Citygate Simulator
//!
//! A long-running contention simulator built on top of the simulation framework.
//! Runs N processes over M cities for a stretch of simulated time and reports
//! how the cities were shared.
//!
//! # Architecture
//!
//! The simulator builds on `citygate-simulation` to provide:
//!
//! - **Configuration**: group shape, policy, latency and seed in one place
//! - **Metrics Collection**: grants per city and process, wait latency
//!   percentiles, message counts and safety violations
//!
//! # Example
//!
//! ```ignore
//! use citygate_simulator::{Simulator, SimulatorConfig};
//! use std::time::Duration;
//!
//! // Five processes contending for two cities
//! let config = SimulatorConfig::new(5, 2).with_request_probability(0.2);
//!
//! let mut simulator = Simulator::new(config)?;
//! let report = simulator.run_for(Duration::from_secs(600));
//!
//! println!("Grants/min: {:.2}", report.grants_per_minute());
//! println!("P99 wait: {:?}", report.p99_wait());
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod runner;

pub use config::SimulatorConfig;
pub use error::SimulatorError;
pub use metrics::{MetricsCollector, SimulationReport};
pub use runner::Simulator;
