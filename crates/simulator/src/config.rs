//! Configuration types for the simulator.

use citygate_arbiter::{ArbiterConfig, PolicyConfig};
use citygate_node::NodeConfig;
use citygate_simulation::NetworkConfig;
use std::time::Duration;

/// Configuration for a simulation run.
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Number of processes.
    pub num_processes: u32,

    /// Number of cities.
    pub num_resources: u32,

    /// Interval between ticks of every process.
    pub tick_interval: Duration,

    /// Decision policy shared by every process (seeded per process).
    pub policy: PolicyConfig,

    /// Arbiter configuration.
    pub arbiter: ArbiterConfig,

    /// One-way message latency range.
    pub min_latency: Duration,
    pub max_latency: Duration,

    /// Random seed for deterministic simulation.
    pub seed: u64,
}

impl SimulatorConfig {
    /// Create a new simulator configuration.
    pub fn new(num_processes: u32, num_resources: u32) -> Self {
        let network = NetworkConfig::default();
        Self {
            num_processes,
            num_resources,
            tick_interval: Duration::from_secs(1),
            policy: PolicyConfig::default(),
            arbiter: ArbiterConfig::default(),
            min_latency: network.min_latency,
            max_latency: network.max_latency,
            seed: 12345,
        }
    }

    /// Set the per-tick request probability.
    pub fn with_request_probability(mut self, probability: f64) -> Self {
        self.policy = self.policy.with_request_probability(probability);
        self
    }

    /// Set the policy configuration.
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Bound every deferred queue.
    pub fn with_deferred_capacity(mut self, capacity: usize) -> Self {
        self.arbiter = ArbiterConfig::with_deferred_capacity(capacity);
        self
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Set the latency range.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min.min(max);
        self.max_latency = max.max(min);
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Convert to a NetworkConfig for the underlying simulation.
    pub fn to_network_config(&self) -> NetworkConfig {
        NetworkConfig::new(self.num_processes, self.num_resources)
            .with_latency(self.min_latency, self.max_latency)
    }

    /// Convert to the NodeConfig every simulated node runs with.
    pub fn to_node_config(&self) -> NodeConfig {
        NodeConfig::default()
            .with_tick_interval(self.tick_interval)
            .with_arbiter(self.arbiter.clone())
            .with_policy(self.policy.clone())
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self::new(3, 2)
    }
}
