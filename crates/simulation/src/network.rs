//! Simulated point-to-point network.

use crate::NodeIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::time::Duration;

/// Shape of the simulated group and its links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Number of processes (N).
    pub num_processes: u32,

    /// Number of resources (M).
    pub num_resources: u32,

    /// Shortest one-way message latency.
    pub min_latency: Duration,

    /// Longest one-way message latency.
    pub max_latency: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_processes: 3,
            num_resources: 2,
            min_latency: Duration::from_millis(5),
            max_latency: Duration::from_millis(50),
        }
    }
}

impl NetworkConfig {
    /// Create a config for `num_processes` peers sharing `num_resources` cities.
    pub fn new(num_processes: u32, num_resources: u32) -> Self {
        Self {
            num_processes,
            num_resources,
            ..Default::default()
        }
    }

    /// Set the latency range.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.min_latency = min.min(max);
        self.max_latency = max.max(min);
        self
    }
}

/// Reliable network with seeded random latency.
///
/// Every message is delivered. Latency is sampled per message, but a message
/// never overtakes an earlier one on the same `(from, to)` link.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    rng: ChaCha8Rng,
    /// Latest scheduled delivery per link.
    last_delivery: HashMap<(NodeIndex, NodeIndex), Duration>,
}

impl SimulatedNetwork {
    /// Create a network seeded with `seed`.
    pub fn new(config: NetworkConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_delivery: HashMap::new(),
        }
    }

    /// Get the network configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Every node except `from`.
    pub fn peers(&self, from: NodeIndex) -> impl Iterator<Item = NodeIndex> {
        (0..self.config.num_processes).filter(move |n| *n != from)
    }

    /// Sample a one-way latency.
    pub fn sample_latency(&mut self) -> Duration {
        let min = self.config.min_latency.as_micros() as u64;
        let max = self.config.max_latency.as_micros() as u64;
        Duration::from_micros(self.rng.gen_range(min..=max))
    }

    /// Schedule a message sent at `now` and return its delivery time.
    ///
    /// Delivery times on one link never decrease; equal times keep send order
    /// through the event queue's sequence numbers.
    pub fn delivery_time(&mut self, from: NodeIndex, to: NodeIndex, now: Duration) -> Duration {
        let sampled = now + self.sample_latency();
        let last = self.last_delivery.entry((from, to)).or_default();
        let at = sampled.max(*last);
        *last = at;
        at
    }

    /// Sample a value in `[0, bound)`, used to stagger node start times.
    pub fn jitter(&mut self, bound: Duration) -> Duration {
        let bound = bound.as_micros() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.rng.gen_range(0..bound))
    }
}
