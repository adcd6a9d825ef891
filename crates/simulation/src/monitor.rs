//! Mutual-exclusion monitor.

use citygate_types::{Phase, ProcessId, ResourceId, Timestamp};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::error;

/// A phase transition observed by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseChange {
    /// Simulated time of the transition.
    pub time: Duration,
    pub process: ProcessId,
    pub resource: Option<ResourceId>,
    pub from: Phase,
    pub to: Phase,
    /// Lamport clock of the process at the transition.
    pub clock: Timestamp,
}

/// Two processes inside the same city at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyViolation {
    pub time: Duration,
    pub resource: ResourceId,
    /// Process already inside.
    pub holder: ProcessId,
    /// Process that entered while `holder` was inside.
    pub intruder: ProcessId,
}

/// Tracks which process is inside each city and records every overlap.
#[derive(Debug, Default)]
pub struct SafetyMonitor {
    occupants: BTreeMap<ResourceId, ProcessId>,
    violations: Vec<SafetyViolation>,
}

impl SafetyMonitor {
    /// Create an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a phase transition.
    pub fn observe(&mut self, change: &PhaseChange) {
        let Some(resource) = change.resource else {
            return;
        };

        if change.from == Phase::InResource
            && self.occupants.get(&resource) == Some(&change.process)
        {
            self.occupants.remove(&resource);
        }

        if change.to == Phase::InResource {
            if let Some(holder) = self.occupants.get(&resource).copied() {
                error!(
                    resource = %resource,
                    holder = %holder,
                    intruder = %change.process,
                    time = ?change.time,
                    "Mutual exclusion violated"
                );
                self.violations.push(SafetyViolation {
                    time: change.time,
                    resource,
                    holder,
                    intruder: change.process,
                });
            }
            self.occupants.insert(resource, change.process);
        }
    }

    /// Process currently inside `resource`.
    pub fn occupant(&self, resource: ResourceId) -> Option<ProcessId> {
        self.occupants.get(&resource).copied()
    }

    /// Every violation seen so far.
    pub fn violations(&self) -> &[SafetyViolation] {
        &self.violations
    }
}
