//! Decision policy consulted by the arbiter.
//!
//! The policy decides *when* to ask for a city, *which* one, how long to stay
//! and how long the city stays locked afterwards. None of these choices affect
//! mutual exclusion; they only shape contention.

use crate::registry::ResourceRegistry;
use citygate_types::{ProcessId, ResourceId, Timestamp};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Pluggable decisions that drive the protocol without being part of it.
pub trait Policy: Send {
    /// Decide, on an idle tick, whether to start a request.
    fn should_request(&mut self) -> bool;

    /// Pick the resource to request.
    fn choose_resource(
        &mut self,
        local: ProcessId,
        clock: Timestamp,
        registry: &ResourceRegistry,
    ) -> Option<ResourceId>;

    /// Number of ticks to hold a resource once entered.
    fn hold_ticks(&mut self) -> u64;

    /// Number of ticks a resource stays locked after release.
    fn cooldown_ticks(&mut self) -> u64;
}

/// Parameters of [`RandomPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Probability of starting a request on an idle tick.
    pub request_probability: f64,

    /// Shortest stay in a city, in ticks.
    pub min_hold_ticks: u64,

    /// Longest stay in a city, in ticks.
    pub max_hold_ticks: u64,

    /// Shortest cooldown after release, in ticks.
    pub min_cooldown_ticks: u64,

    /// Longest cooldown after release, in ticks.
    pub max_cooldown_ticks: u64,

    /// RNG seed. Runners usually mix in the process id.
    pub seed: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            request_probability: 0.1,
            min_hold_ticks: 1,
            max_hold_ticks: 3,
            min_cooldown_ticks: 5,
            max_cooldown_ticks: 9,
            seed: 12345,
        }
    }
}

impl PolicyConfig {
    /// Set the per-tick request probability.
    pub fn with_request_probability(mut self, probability: f64) -> Self {
        self.request_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Set the hold range, in ticks.
    pub fn with_hold_ticks(mut self, min: u64, max: u64) -> Self {
        self.min_hold_ticks = min.min(max);
        self.max_hold_ticks = max.max(min);
        self
    }

    /// Set the cooldown range, in ticks.
    pub fn with_cooldown_ticks(mut self, min: u64, max: u64) -> Self {
        self.min_cooldown_ticks = min.min(max);
        self.max_cooldown_ticks = max.max(min);
        self
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Seeded random policy.
///
/// Resource choice rotates by process id and clock so that peers starting at
/// the same time spread over different cities, and prefers cities out of
/// cooldown. If every city is cooling down it picks one uniformly at random.
pub struct RandomPolicy {
    config: PolicyConfig,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    /// Create a policy for `local`, seeded from the config seed and the process id.
    pub fn new(config: PolicyConfig, local: ProcessId) -> Self {
        let seed = config
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(local.0 as u64);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
        }
    }

    /// Get the policy configuration.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Uniform sample in `[min, max]`; tolerates a reversed range from a config file.
    fn sample(&mut self, min: u64, max: u64) -> u64 {
        self.rng.gen_range(min.min(max)..=max.max(min))
    }
}

impl Policy for RandomPolicy {
    fn should_request(&mut self) -> bool {
        let probability = self.config.request_probability;
        if probability.is_nan() {
            return false;
        }
        self.rng.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn choose_resource(
        &mut self,
        local: ProcessId,
        clock: Timestamp,
        registry: &ResourceRegistry,
    ) -> Option<ResourceId> {
        let resources = registry.resource_ids();
        if resources.is_empty() {
            return None;
        }

        let start = (local.0 as u64).wrapping_add(clock.0) as usize % resources.len();
        let preferred = (0..resources.len())
            .map(|offset| resources[(start + offset) % resources.len()])
            .find(|r| registry.is_free(*r));

        preferred.or_else(|| Some(resources[self.rng.gen_range(0..resources.len())]))
    }

    fn hold_ticks(&mut self) -> u64 {
        let (min, max) = (self.config.min_hold_ticks, self.config.max_hold_ticks);
        self.sample(min, max)
    }

    fn cooldown_ticks(&mut self) -> u64 {
        let (min, max) = (self.config.min_cooldown_ticks, self.config.max_cooldown_ticks);
        self.sample(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceState;

    fn cooling(registry: &mut ResourceRegistry, resource: u32) {
        *registry.get_mut(ResourceId(resource)).unwrap() = ResourceState {
            remaining_ticks: 3,
            owner: Some(ProcessId(9)),
            stamp: None,
        };
    }

    #[test]
    fn test_rotation_starts_at_pid_plus_clock() {
        let registry = ResourceRegistry::new((0..5).map(ResourceId));
        let mut policy = RandomPolicy::new(PolicyConfig::default(), ProcessId(2));
        assert_eq!(
            policy.choose_resource(ProcessId(2), Timestamp(1), &registry),
            Some(ResourceId(3))
        );
        assert_eq!(
            policy.choose_resource(ProcessId(2), Timestamp(4), &registry),
            Some(ResourceId(1))
        );
    }

    #[test]
    fn test_rotation_skips_cooling_resources() {
        let mut registry = ResourceRegistry::new((0..4).map(ResourceId));
        cooling(&mut registry, 1);
        cooling(&mut registry, 2);
        let mut policy = RandomPolicy::new(PolicyConfig::default(), ProcessId(1));
        assert_eq!(
            policy.choose_resource(ProcessId(1), Timestamp(0), &registry),
            Some(ResourceId(3))
        );
    }

    #[test]
    fn test_falls_back_to_any_resource_when_all_cooling() {
        let mut registry = ResourceRegistry::new((0..3).map(ResourceId));
        for r in 0..3 {
            cooling(&mut registry, r);
        }
        let mut policy = RandomPolicy::new(PolicyConfig::default(), ProcessId(0));
        for clock in 0..20 {
            let chosen = policy
                .choose_resource(ProcessId(0), Timestamp(clock), &registry)
                .unwrap();
            assert!(chosen.0 < 3);
        }
    }

    #[test]
    fn test_samples_stay_in_configured_ranges() {
        let config = PolicyConfig::default()
            .with_hold_ticks(2, 4)
            .with_cooldown_ticks(6, 6);
        let mut policy = RandomPolicy::new(config, ProcessId(3));
        for _ in 0..100 {
            assert!((2..=4).contains(&policy.hold_ticks()));
            assert_eq!(policy.cooldown_ticks(), 6);
        }
    }

    #[test]
    fn test_same_seed_same_decisions() {
        let mut a = RandomPolicy::new(PolicyConfig::default().with_seed(7), ProcessId(1));
        let mut b = RandomPolicy::new(PolicyConfig::default().with_seed(7), ProcessId(1));
        let run_a: Vec<_> = (0..50).map(|_| a.should_request()).collect();
        let run_b: Vec<_> = (0..50).map(|_| b.should_request()).collect();
        assert_eq!(run_a, run_b);
    }

    #[test]
    fn test_probability_extremes() {
        let mut never =
            RandomPolicy::new(PolicyConfig::default().with_request_probability(0.0), ProcessId(0));
        let mut always =
            RandomPolicy::new(PolicyConfig::default().with_request_probability(1.0), ProcessId(0));
        assert!((0..100).all(|_| !never.should_request()));
        assert!((0..100).all(|_| always.should_request()));
    }
}
