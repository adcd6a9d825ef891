//! Node configuration.

use citygate_arbiter::{ArbiterConfig, PolicyConfig};
use std::time::Duration;

/// Configuration for a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    /// Interval between local loop ticks.
    pub tick_interval: Duration,

    /// Arbiter configuration.
    pub arbiter: ArbiterConfig,

    /// Configuration of the default random policy.
    pub policy: PolicyConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            arbiter: ArbiterConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Set the tick interval.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Set the arbiter configuration.
    pub fn with_arbiter(mut self, arbiter: ArbiterConfig) -> Self {
        self.arbiter = arbiter;
        self
    }

    /// Set the policy configuration.
    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }
}
