//! Cooldown ownership and propagation.
//!
//! Each cooldown is a single-owner replicated counter. The process that
//! released a resource owns its cooldown: it alone decrements the counter,
//! once per tick, and broadcasts the new value after every decrement. The
//! decrement that reaches zero broadcasts `owner = None` and ends the epoch.
//!
//! Replicas apply updates in Lamport order of `(timestamp, sender)`. A new
//! owner can only exist after it has observed the previous owner's terminal
//! update, so its updates always carry a later stamp; an older update that
//! arrives late over a different link is discarded instead of resurrecting a
//! finished cooldown.

use crate::registry::ResourceRegistry;
use citygate_messages::CooldownUpdateGossip;
use citygate_types::{LamportClock, ProcessId, ResourceId};
use tracing::{debug, trace, warn};

/// What merging a received update did to the local replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The update was applied.
    Applied {
        /// The resource went from cooling down to free.
        cleared: bool,
    },
    /// The update is older than the state already applied.
    Stale,
    /// The resource is not in the registry.
    UnknownResource,
}

/// Produces and merges cooldown updates for the local process.
#[derive(Debug, Clone, Copy)]
pub struct CooldownPropagator {
    local: ProcessId,
}

impl CooldownPropagator {
    /// Create a propagator acting for `local`.
    pub fn new(local: ProcessId) -> Self {
        Self { local }
    }

    /// Start a cooldown of `ticks` on a resource we just released.
    ///
    /// Returns the update to broadcast. A zero-length cooldown produces the
    /// terminal update straight away.
    pub fn start(
        &self,
        registry: &mut ResourceRegistry,
        clock: &mut LamportClock,
        resource: ResourceId,
        ticks: u64,
    ) -> Option<CooldownUpdateGossip> {
        let Some(state) = registry.get_mut(resource) else {
            warn!(resource = %resource, "Cannot start cooldown on unknown resource");
            return None;
        };

        let timestamp = clock.tick_on_send();
        let owner = (ticks > 0).then_some(self.local);
        state.remaining_ticks = ticks;
        state.owner = owner;
        state.stamp = Some((timestamp, self.local));

        debug!(
            resource = %resource,
            ticks,
            clock = timestamp.0,
            "Started cooldown"
        );

        Some(CooldownUpdateGossip::new(
            self.local, resource, ticks, owner, timestamp,
        ))
    }

    /// Decrement every running cooldown we own by one tick.
    ///
    /// Returns one update per decrement, in resource order.
    pub fn advance(
        &self,
        registry: &mut ResourceRegistry,
        clock: &mut LamportClock,
    ) -> Vec<CooldownUpdateGossip> {
        let mut updates = Vec::new();

        for resource in registry.owned_by(self.local) {
            let Some(state) = registry.get_mut(resource) else {
                continue;
            };

            let timestamp = clock.tick_on_send();
            state.remaining_ticks -= 1;
            if state.remaining_ticks == 0 {
                state.owner = None;
            }
            state.stamp = Some((timestamp, self.local));

            trace!(
                resource = %resource,
                remaining = state.remaining_ticks,
                "Cooldown decremented"
            );

            updates.push(CooldownUpdateGossip::new(
                self.local,
                resource,
                state.remaining_ticks,
                state.owner,
                timestamp,
            ));
        }

        updates
    }

    /// Apply an update received from a cooldown owner.
    ///
    /// The caller has already merged the update's timestamp into the clock.
    pub fn merge(
        &self,
        registry: &mut ResourceRegistry,
        update: &CooldownUpdateGossip,
    ) -> MergeOutcome {
        let Some(state) = registry.get_mut(update.resource) else {
            return MergeOutcome::UnknownResource;
        };

        if state.stamp.is_some_and(|applied| update.stamp() < applied) {
            debug!(
                resource = %update.resource,
                sender = %update.sender,
                update_clock = update.timestamp.0,
                "Ignoring stale cooldown update"
            );
            return MergeOutcome::Stale;
        }

        let was_cooling = state.remaining_ticks > 0;
        state.remaining_ticks = update.remaining_ticks;
        state.owner = update.owner;
        state.stamp = Some(update.stamp());

        MergeOutcome::Applied {
            cleared: was_cooling && state.remaining_ticks == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ResourceState;
    use citygate_types::Timestamp;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new((0..2).map(ResourceId))
    }

    #[test]
    fn test_owner_counts_down_and_releases_ownership() {
        let owner = CooldownPropagator::new(ProcessId(0));
        let mut registry = registry();
        let mut clock = LamportClock::new();

        let start = owner
            .start(&mut registry, &mut clock, ResourceId(0), 2)
            .unwrap();
        assert_eq!(start.remaining_ticks, 2);
        assert_eq!(start.owner, Some(ProcessId(0)));

        let first = owner.advance(&mut registry, &mut clock);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].remaining_ticks, 1);
        assert_eq!(first[0].owner, Some(ProcessId(0)));

        let last = owner.advance(&mut registry, &mut clock);
        assert_eq!(last[0].remaining_ticks, 0);
        assert_eq!(last[0].owner, None);
        assert!(registry.is_free(ResourceId(0)));

        // Nothing owned any more, nothing to broadcast.
        assert!(owner.advance(&mut registry, &mut clock).is_empty());
    }

    #[test]
    fn test_zero_length_cooldown_is_terminal_immediately() {
        let owner = CooldownPropagator::new(ProcessId(1));
        let mut registry = registry();
        let mut clock = LamportClock::new();

        let update = owner
            .start(&mut registry, &mut clock, ResourceId(1), 0)
            .unwrap();
        assert!(update.is_terminal());
        assert_eq!(update.owner, None);
        assert!(owner.advance(&mut registry, &mut clock).is_empty());
    }

    #[test]
    fn test_non_owner_never_decrements() {
        let replica = CooldownPropagator::new(ProcessId(1));
        let mut registry = registry();
        let mut clock = LamportClock::new();

        let update = CooldownUpdateGossip::new(
            ProcessId(0),
            ResourceId(0),
            5,
            Some(ProcessId(0)),
            Timestamp(3),
        );
        assert_eq!(
            replica.merge(&mut registry, &update),
            MergeOutcome::Applied { cleared: false }
        );
        assert!(replica.advance(&mut registry, &mut clock).is_empty());
        assert_eq!(registry.remaining_ticks(ResourceId(0)), 5);
    }

    #[test]
    fn test_replicas_converge_on_terminal_update() {
        let owner = CooldownPropagator::new(ProcessId(0));
        let mut owner_registry = registry();
        let mut clock = LamportClock::new();

        let mut stream = vec![owner
            .start(&mut owner_registry, &mut clock, ResourceId(0), 3)
            .unwrap()];
        for _ in 0..3 {
            stream.extend(owner.advance(&mut owner_registry, &mut clock));
        }

        for pid in 1..4 {
            let replica = CooldownPropagator::new(ProcessId(pid));
            let mut replica_registry = registry();
            let mut outcomes = Vec::new();
            for update in &stream {
                outcomes.push(replica.merge(&mut replica_registry, update));
            }
            assert_eq!(
                outcomes.last(),
                Some(&MergeOutcome::Applied { cleared: true })
            );
            let state = replica_registry.get(ResourceId(0)).unwrap();
            assert_eq!((state.remaining_ticks, state.owner), (0, None));
        }
    }

    #[test]
    fn test_late_update_from_previous_owner_is_stale() {
        let replica = CooldownPropagator::new(ProcessId(2));
        let mut registry = registry();

        // New owner (process 1) started its cooldown after seeing process 0 finish.
        let newer = CooldownUpdateGossip::new(
            ProcessId(1),
            ResourceId(0),
            6,
            Some(ProcessId(1)),
            Timestamp(20),
        );
        replica.merge(&mut registry, &newer);

        // An older mid-cooldown update from process 0 arrives late.
        let older = CooldownUpdateGossip::new(
            ProcessId(0),
            ResourceId(0),
            0,
            None,
            Timestamp(12),
        );
        assert_eq!(replica.merge(&mut registry, &older), MergeOutcome::Stale);
        assert_eq!(
            *registry.get(ResourceId(0)).unwrap(),
            ResourceState {
                remaining_ticks: 6,
                owner: Some(ProcessId(1)),
                stamp: Some((Timestamp(20), ProcessId(1))),
            }
        );
    }

    #[test]
    fn test_unknown_resource_reported() {
        let replica = CooldownPropagator::new(ProcessId(0));
        let mut registry = registry();
        let update = CooldownUpdateGossip::new(ProcessId(1), ResourceId(9), 1, None, Timestamp(1));
        assert_eq!(
            replica.merge(&mut registry, &update),
            MergeOutcome::UnknownResource
        );
    }
}
