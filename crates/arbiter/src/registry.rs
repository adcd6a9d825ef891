//! Local replica of every resource's cooldown state.

use citygate_types::{ProcessId, ResourceId, Timestamp};
use std::collections::BTreeMap;

/// Cooldown state of one resource, as seen by this process.
///
/// Only `owner` decrements `remaining_ticks`. Every other process holds a
/// read-only replica that is overwritten by the owner's updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceState {
    /// Ticks left before the resource can be entered again.
    pub remaining_ticks: u64,
    /// Process holding decrement authority.
    pub owner: Option<ProcessId>,
    /// Lamport stamp `(timestamp, sender)` of the update last applied.
    pub stamp: Option<(Timestamp, ProcessId)>,
}

impl ResourceState {
    /// Check whether the resource is out of cooldown.
    pub fn is_free(&self) -> bool {
        self.remaining_ticks == 0
    }

    /// Check whether `process` owns the running cooldown.
    pub fn is_owned_by(&self, process: ProcessId) -> bool {
        self.owner == Some(process)
    }
}

/// Per-process map from resource id to its cooldown replica.
///
/// Every resource is created at startup with no cooldown and no owner, and is
/// never removed.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<ResourceId, ResourceState>,
}

impl ResourceRegistry {
    /// Create a registry holding the given resources, all free.
    pub fn new(resources: impl IntoIterator<Item = ResourceId>) -> Self {
        Self {
            resources: resources
                .into_iter()
                .map(|r| (r, ResourceState::default()))
                .collect(),
        }
    }

    /// Get the state of a resource.
    pub fn get(&self, resource: ResourceId) -> Option<&ResourceState> {
        self.resources.get(&resource)
    }

    /// Get mutable state of a resource.
    pub fn get_mut(&mut self, resource: ResourceId) -> Option<&mut ResourceState> {
        self.resources.get_mut(&resource)
    }

    /// Ticks left on a resource's cooldown (0 for unknown resources).
    pub fn remaining_ticks(&self, resource: ResourceId) -> u64 {
        self.get(resource).map_or(0, |s| s.remaining_ticks)
    }

    /// Check whether a known resource is out of cooldown.
    pub fn is_free(&self, resource: ResourceId) -> bool {
        self.get(resource).is_some_and(ResourceState::is_free)
    }

    /// Check whether a resource is known.
    pub fn contains(&self, resource: ResourceId) -> bool {
        self.resources.contains_key(&resource)
    }

    /// Resources whose cooldown is owned by `process` and still running.
    pub fn owned_by(&self, process: ProcessId) -> Vec<ResourceId> {
        self.resources
            .iter()
            .filter(|(_, s)| s.is_owned_by(process) && s.remaining_ticks > 0)
            .map(|(r, _)| *r)
            .collect()
    }

    /// All resource ids, in ascending order.
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources_start_free_and_unowned() {
        let registry = ResourceRegistry::new((0..3).map(ResourceId));
        assert_eq!(registry.resource_ids().len(), 3);
        for resource in registry.resource_ids() {
            assert_eq!(registry.get(resource), Some(&ResourceState::default()));
            assert!(registry.is_free(resource));
        }
    }

    #[test]
    fn test_owned_by_skips_finished_cooldowns() {
        let mut registry = ResourceRegistry::new((0..3).map(ResourceId));
        let me = ProcessId(1);
        *registry.get_mut(ResourceId(0)).unwrap() = ResourceState {
            remaining_ticks: 4,
            owner: Some(me),
            stamp: None,
        };
        *registry.get_mut(ResourceId(2)).unwrap() = ResourceState {
            remaining_ticks: 2,
            owner: Some(ProcessId(0)),
            stamp: None,
        };
        assert_eq!(registry.owned_by(me), vec![ResourceId(0)]);
        assert!(registry.is_free(ResourceId(1)));
        assert!(!registry.is_free(ResourceId(0)));
        assert_eq!(registry.remaining_ticks(ResourceId(2)), 2);
    }

    #[test]
    fn test_unknown_resource_is_not_free() {
        let registry = ResourceRegistry::new([ResourceId(0)]);
        assert!(!registry.is_free(ResourceId(5)));
        assert!(!registry.contains(ResourceId(5)));
    }
}
