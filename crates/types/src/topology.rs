//! Topology trait and static implementation.

use crate::{ProcessId, ResourceId};
use std::sync::Arc;

/// Bootstrap view of the peer group.
///
/// Provides a stable process count N, the local process id in `[0, N)` and the
/// resource count M. Membership never changes after the first tick.
pub trait Topology: Send + Sync {
    /// Get the local process id.
    fn local_process_id(&self) -> ProcessId;

    /// Get the number of processes in the group (N).
    fn num_processes(&self) -> u32;

    /// Get the number of resources (M).
    fn num_resources(&self) -> u32;

    // Derived methods

    /// All process ids in ascending order, including the local one.
    fn processes(&self) -> Vec<ProcessId> {
        (0..self.num_processes()).map(ProcessId).collect()
    }

    /// All process ids except the local one, in ascending order.
    fn peers(&self) -> Vec<ProcessId> {
        let local = self.local_process_id();
        self.processes().into_iter().filter(|p| *p != local).collect()
    }

    /// All resource ids in ascending order.
    fn resources(&self) -> Vec<ResourceId> {
        (0..self.num_resources()).map(ResourceId).collect()
    }

    /// Number of acknowledgements a requester needs (N - 1).
    fn quorum_size(&self) -> usize {
        self.num_processes().saturating_sub(1) as usize
    }

    /// Check whether a process id belongs to the group.
    fn contains_process(&self, process: ProcessId) -> bool {
        process.0 < self.num_processes()
    }

    /// Check whether a resource id is in range.
    fn contains_resource(&self, resource: ResourceId) -> bool {
        resource.0 < self.num_resources()
    }
}

/// Errors that can occur when building a topology.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    /// The group must contain at least one process.
    #[error("a group needs at least one process")]
    NoProcesses,

    /// There must be at least one resource to contend for.
    #[error("a group needs at least one resource")]
    NoResources,

    /// Local id is outside `[0, N)`.
    #[error("local process {local} is outside a group of {num_processes}")]
    LocalOutOfRange { local: ProcessId, num_processes: u32 },
}

/// A fixed topology, known before the first tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticTopology {
    local_process_id: ProcessId,
    num_processes: u32,
    num_resources: u32,
}

impl StaticTopology {
    /// Create a new static topology.
    pub fn new(
        local_process_id: ProcessId,
        num_processes: u32,
        num_resources: u32,
    ) -> Result<Self, TopologyError> {
        if num_processes == 0 {
            return Err(TopologyError::NoProcesses);
        }
        if num_resources == 0 {
            return Err(TopologyError::NoResources);
        }
        if local_process_id.0 >= num_processes {
            return Err(TopologyError::LocalOutOfRange {
                local: local_process_id,
                num_processes,
            });
        }
        Ok(Self {
            local_process_id,
            num_processes,
            num_resources,
        })
    }

    /// Build one topology per process of the group.
    pub fn group(num_processes: u32, num_resources: u32) -> Result<Vec<Self>, TopologyError> {
        if num_processes == 0 {
            return Err(TopologyError::NoProcesses);
        }
        (0..num_processes)
            .map(|id| Self::new(ProcessId(id), num_processes, num_resources))
            .collect()
    }

    /// Create a topology as an Arc.
    pub fn into_arc(self) -> Arc<dyn Topology> {
        Arc::new(self)
    }
}

impl Topology for StaticTopology {
    fn local_process_id(&self) -> ProcessId {
        self.local_process_id
    }

    fn num_processes(&self) -> u32 {
        self.num_processes
    }

    fn num_resources(&self) -> u32 {
        self.num_resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peers_exclude_local() {
        let topology = StaticTopology::new(ProcessId(1), 4, 2).unwrap();
        assert_eq!(
            topology.peers(),
            vec![ProcessId(0), ProcessId(2), ProcessId(3)]
        );
        assert_eq!(topology.quorum_size(), 3);
    }

    #[test]
    fn test_single_process_needs_no_acks() {
        let topology = StaticTopology::new(ProcessId(0), 1, 1).unwrap();
        assert!(topology.peers().is_empty());
        assert_eq!(topology.quorum_size(), 0);
    }

    #[test]
    fn test_range_checks() {
        let topology = StaticTopology::new(ProcessId(0), 3, 2).unwrap();
        assert!(topology.contains_process(ProcessId(2)));
        assert!(!topology.contains_process(ProcessId(3)));
        assert!(topology.contains_resource(ResourceId(1)));
        assert!(!topology.contains_resource(ResourceId(2)));
    }

    #[test]
    fn test_invalid_topologies_rejected() {
        assert_eq!(
            StaticTopology::new(ProcessId(0), 0, 1),
            Err(TopologyError::NoProcesses)
        );
        assert_eq!(
            StaticTopology::new(ProcessId(0), 2, 0),
            Err(TopologyError::NoResources)
        );
        assert!(matches!(
            StaticTopology::new(ProcessId(5), 3, 1),
            Err(TopologyError::LocalOutOfRange { .. })
        ));
    }

    #[test]
    fn test_group_builds_every_member() {
        let group = StaticTopology::group(3, 2).unwrap();
        let ids: Vec<_> = group.iter().map(|t| t.local_process_id()).collect();
        assert_eq!(ids, vec![ProcessId(0), ProcessId(1), ProcessId(2)]);
    }
}
