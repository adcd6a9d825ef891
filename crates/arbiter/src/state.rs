//! Arbitration state machine.

use crate::config::ArbiterConfig;
use crate::cooldown::{CooldownPropagator, MergeOutcome};
use crate::deferred::DeferredQueues;
use crate::policy::Policy;
use crate::registry::ResourceRegistry;
use citygate_core::Action;
use citygate_messages::{AckResponse, CooldownUpdateGossip, RequestGossip};
use citygate_types::{LamportClock, Phase, ProcessId, Request, ResourceId, Timestamp, Topology};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Per-process arbitration state.
///
/// Owns the Lamport clock, the local cooldown replica of every resource and the
/// deferred queues. Every handler is synchronous and returns the actions the
/// runner must perform; nothing here touches the network directly.
pub struct ArbiterState {
    /// Network topology (process count, resource count, local id).
    topology: Arc<dyn Topology>,

    /// Arbiter configuration.
    config: ArbiterConfig,

    /// Decision policy (when to request, which city, how long).
    policy: Box<dyn Policy>,

    /// Local Lamport clock.
    clock: LamportClock,

    /// Cooldown replica of every resource.
    registry: ResourceRegistry,

    /// Requests we postponed because our own claim has priority.
    deferred: DeferredQueues,

    /// Produces and merges cooldown updates.
    cooldown: CooldownPropagator,

    /// Current phase.
    phase: Phase,

    /// Resource held (IN_RESOURCE) or sought (REQUESTING, WAITING).
    held_or_sought: Option<ResourceId>,

    /// Stamp of our outstanding request.
    request_timestamp: Option<Timestamp>,

    /// Peers that acknowledged the outstanding request.
    acks: BTreeSet<ProcessId>,

    /// Ticks left before releasing the held resource.
    hold_remaining: u64,
}

impl std::fmt::Debug for ArbiterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbiterState")
            .field("local", &self.local_id())
            .field("clock", &self.clock.now())
            .field("phase", &self.phase)
            .field("held_or_sought", &self.held_or_sought)
            .field("request_timestamp", &self.request_timestamp)
            .field("acks", &self.acks)
            .field("hold_remaining", &self.hold_remaining)
            .field("deferred", &self.deferred.total_len())
            .finish()
    }
}

impl ArbiterState {
    /// Create the state for the local process of `topology`.
    ///
    /// Every resource starts free and unowned, the clock starts at zero.
    pub fn new(
        topology: Arc<dyn Topology>,
        config: ArbiterConfig,
        policy: Box<dyn Policy>,
    ) -> Self {
        let local = topology.local_process_id();
        Self {
            registry: ResourceRegistry::new(topology.resources()),
            deferred: DeferredQueues::new(config.max_deferred_per_resource),
            cooldown: CooldownPropagator::new(local),
            clock: LamportClock::new(),
            phase: Phase::Idle,
            held_or_sought: None,
            request_timestamp: None,
            acks: BTreeSet::new(),
            hold_remaining: 0,
            topology,
            config,
            policy,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    /// Get the local process ID.
    pub fn local_id(&self) -> ProcessId {
        self.topology.local_process_id()
    }

    /// Get the arbiter configuration.
    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    /// Get the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Resource held or sought, if any.
    pub fn held_or_sought(&self) -> Option<ResourceId> {
        self.held_or_sought
    }

    /// Stamp of the outstanding request, if any.
    pub fn request_timestamp(&self) -> Option<Timestamp> {
        self.request_timestamp
    }

    /// Number of distinct acks collected for the outstanding request.
    pub fn ack_count(&self) -> usize {
        self.acks.len()
    }

    /// Number of acks still missing before the quorum is complete.
    ///
    /// Zero outside REQUESTING.
    pub fn pending_ack_count(&self) -> usize {
        if self.phase != Phase::Requesting {
            return 0;
        }
        self.topology.quorum_size().saturating_sub(self.acks.len())
    }

    /// Ticks left in IN_RESOURCE.
    pub fn hold_remaining(&self) -> u64 {
        self.hold_remaining
    }

    /// Current Lamport clock value.
    pub fn clock(&self) -> Timestamp {
        self.clock.now()
    }

    /// Local cooldown replica.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Deferred request queues.
    pub fn deferred(&self) -> &DeferredQueues {
        &self.deferred
    }

    /// Check whether we hold a claim on `resource`.
    fn claims(&self, resource: ResourceId) -> bool {
        self.phase.holds_claim() && self.held_or_sought == Some(resource)
    }

    /// Our own outstanding request, if we claim `resource`.
    fn own_request(&self, resource: ResourceId) -> Option<Request> {
        if !self.claims(resource) {
            return None;
        }
        self.request_timestamp
            .map(|ts| Request::new(self.local_id(), ts, resource))
    }

    fn quorum_reached(&self) -> bool {
        self.acks.len() >= self.topology.quorum_size()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Tick
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle one tick of the local loop.
    ///
    /// In order: advance the cooldowns we own, count down the hold (releasing
    /// when it expires) and, if we started the tick idle, ask the policy
    /// whether to request a city.
    pub fn on_tick(&mut self) -> Vec<Action> {
        let mut actions = vec![];
        let started_idle = self.phase == Phase::Idle;
        let started_inside = self.phase == Phase::InResource;

        for update in self.cooldown.advance(&mut self.registry, &mut self.clock) {
            let resource = update.resource;
            let terminal = update.is_terminal();
            actions.push(Action::Broadcast {
                message: update.into(),
            });
            if terminal {
                info!(
                    process = %self.local_id(),
                    resource = %resource,
                    "City available again"
                );
                actions.extend(self.on_resource_free(resource));
            }
        }

        // Entering during this tick's cooldown step does not consume hold time.
        if started_inside && self.phase == Phase::InResource {
            self.hold_remaining = self.hold_remaining.saturating_sub(1);
            trace!(remaining = self.hold_remaining, "Hold countdown");
            if self.hold_remaining == 0 {
                actions.extend(self.release());
            }
        }

        if started_idle && self.phase == Phase::Idle && self.policy.should_request() {
            let (local, now) = (self.local_id(), self.clock.now());
            let chosen = self.policy.choose_resource(local, now, &self.registry);
            match chosen {
                Some(resource) => actions.extend(self.begin_request(resource)),
                None => debug!("Policy chose no resource"),
            }
        }

        actions
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Requesting
    // ═══════════════════════════════════════════════════════════════════════════

    /// Start a request for `resource`: IDLE → REQUESTING.
    ///
    /// Broadcasts the request to every peer. With no peers the quorum is
    /// already complete and the transition continues straight away.
    pub fn begin_request(&mut self, resource: ResourceId) -> Vec<Action> {
        if self.phase != Phase::Idle {
            warn!(
                phase = %self.phase,
                resource = %resource,
                "Cannot request a city outside IDLE"
            );
            return vec![];
        }
        if !self.registry.contains(resource) {
            warn!(resource = %resource, "Cannot request unknown city");
            return vec![];
        }

        let timestamp = self.clock.tick_on_send();
        self.held_or_sought = Some(resource);
        self.request_timestamp = Some(timestamp);
        self.acks.clear();

        info!(
            process = %self.local_id(),
            resource = %resource,
            clock = timestamp.0,
            cooldown = self.registry.remaining_ticks(resource),
            "Sending request"
        );

        let mut actions = vec![self.transition(Phase::Requesting)];
        let request = Request::new(self.local_id(), timestamp, resource);
        actions.push(Action::Broadcast {
            message: RequestGossip::new(request).into(),
        });

        if self.quorum_reached() {
            actions.extend(self.complete_quorum());
        }
        actions
    }

    /// Handle a peer's request.
    ///
    /// Acks immediately unless we claim the same resource with a request that
    /// has priority, in which case the request is deferred until we release.
    pub fn on_request(&mut self, gossip: RequestGossip) -> Vec<Action> {
        self.clock.merge_on_receive(gossip.timestamp());
        let incoming = gossip.into_request();

        if incoming.requester == self.local_id() {
            warn!(clock = incoming.timestamp.0, "Ignoring our own request");
            return vec![];
        }
        if !self.registry.contains(incoming.resource) {
            warn!(
                from = %incoming.requester,
                resource = %incoming.resource,
                "Ignoring request for unknown city"
            );
            return vec![];
        }

        let Some(own) = self.own_request(incoming.resource) else {
            return vec![self.ack(incoming.requester, incoming.resource)];
        };

        if !own.has_priority_over(&incoming) {
            debug!(
                from = %incoming.requester,
                resource = %incoming.resource,
                their_clock = incoming.timestamp.0,
                our_clock = own.timestamp.0,
                "Competing request has priority, acking"
            );
            return vec![self.ack(incoming.requester, incoming.resource)];
        }

        match self.deferred.insert(incoming) {
            Ok(true) => info!(
                process = %self.local_id(),
                from = %incoming.requester,
                resource = %incoming.resource,
                their_clock = incoming.timestamp.0,
                phase = %self.phase,
                "Deferring request"
            ),
            Ok(false) => debug!(
                from = %incoming.requester,
                clock = incoming.timestamp.0,
                "Duplicate request already deferred"
            ),
            Err(e) => warn!(
                from = %incoming.requester,
                error = %e,
                "Dropping request, it will not be acknowledged"
            ),
        }
        vec![]
    }

    /// Handle a peer's ack.
    ///
    /// Only acks for the resource we are requesting count, and each peer
    /// counts once. On the last missing ack, enter the city if it is free or
    /// wait for its cooldown otherwise.
    pub fn on_ack(&mut self, ack: AckResponse) -> Vec<Action> {
        self.clock.merge_on_receive(ack.timestamp);

        if self.phase != Phase::Requesting || self.held_or_sought != Some(ack.resource) {
            debug!(
                from = %ack.sender,
                resource = %ack.resource,
                phase = %self.phase,
                "Discarding ack that matches no outstanding request"
            );
            return vec![];
        }
        if ack.sender == self.local_id() || !self.topology.contains_process(ack.sender) {
            warn!(from = %ack.sender, "Discarding ack from a non-peer");
            return vec![];
        }
        if !self.acks.insert(ack.sender) {
            debug!(from = %ack.sender, "Duplicate ack");
            return vec![];
        }

        debug!(
            from = %ack.sender,
            resource = %ack.resource,
            acks = self.acks.len(),
            quorum = self.topology.quorum_size(),
            "Ack received"
        );

        if self.quorum_reached() {
            self.complete_quorum()
        } else {
            vec![]
        }
    }

    /// REQUESTING with a full quorum: enter or wait for the cooldown.
    fn complete_quorum(&mut self) -> Vec<Action> {
        let Some(resource) = self.held_or_sought else {
            return vec![];
        };

        if self.registry.is_free(resource) {
            return self.enter();
        }

        info!(
            process = %self.local_id(),
            resource = %resource,
            cooldown = self.registry.remaining_ticks(resource),
            "Quorum reached, waiting for cooldown"
        );
        vec![self.transition(Phase::Waiting)]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Holding and releasing
    // ═══════════════════════════════════════════════════════════════════════════

    fn enter(&mut self) -> Vec<Action> {
        // A zero-tick stay would release before anyone could observe it.
        self.hold_remaining = self.policy.hold_ticks().max(1);

        info!(
            process = %self.local_id(),
            resource = ?self.held_or_sought,
            hold = self.hold_remaining,
            clock = self.clock.now().0,
            "Entering city"
        );
        vec![self.transition(Phase::InResource)]
    }

    /// IN_RESOURCE → IDLE.
    ///
    /// Starts the cooldown, broadcasts it, then acks every deferred request in
    /// priority order. The cooldown goes out first so that a drained requester
    /// sees it before its quorum can complete.
    fn release(&mut self) -> Vec<Action> {
        let Some(resource) = self.held_or_sought else {
            return vec![];
        };

        let ticks = self.policy.cooldown_ticks();
        info!(
            process = %self.local_id(),
            resource = %resource,
            cooldown = ticks,
            "Leaving city"
        );

        let mut actions = vec![self.transition(Phase::Idle)];
        self.held_or_sought = None;
        self.request_timestamp = None;
        self.acks.clear();
        self.hold_remaining = 0;

        if let Some(update) =
            self.cooldown
                .start(&mut self.registry, &mut self.clock, resource, ticks)
        {
            actions.push(Action::Broadcast {
                message: update.into(),
            });
        }
        actions.extend(self.drain_deferred(resource));
        actions
    }

    fn drain_deferred(&mut self, resource: ResourceId) -> Vec<Action> {
        let drained = self.deferred.drain(resource);
        if !drained.is_empty() {
            debug!(
                resource = %resource,
                count = drained.len(),
                "Acking deferred requests"
            );
        }
        drained
            .into_iter()
            .map(|request| self.ack(request.requester, resource))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Cooldown replication
    // ═══════════════════════════════════════════════════════════════════════════

    /// Handle a cooldown update from the resource's owner.
    pub fn on_cooldown_update(&mut self, update: CooldownUpdateGossip) -> Vec<Action> {
        self.clock.merge_on_receive(update.timestamp);

        match self.cooldown.merge(&mut self.registry, &update) {
            MergeOutcome::Applied { cleared } => {
                if cleared {
                    info!(
                        process = %self.local_id(),
                        resource = %update.resource,
                        from = %update.sender,
                        "City available again"
                    );
                } else {
                    trace!(
                        resource = %update.resource,
                        remaining = update.remaining_ticks,
                        "Cooldown replica updated"
                    );
                }
                if self.registry.is_free(update.resource) {
                    self.on_resource_free(update.resource)
                } else {
                    vec![]
                }
            }
            MergeOutcome::Stale => vec![],
            MergeOutcome::UnknownResource => {
                warn!(
                    from = %update.sender,
                    resource = %update.resource,
                    "Cooldown update for unknown city"
                );
                vec![]
            }
        }
    }

    /// A resource's cooldown reached zero.
    ///
    /// Enter it if we were waiting on it. If we hold no claim on it, ack
    /// anything still deferred for it.
    fn on_resource_free(&mut self, resource: ResourceId) -> Vec<Action> {
        if self.phase == Phase::Waiting && self.held_or_sought == Some(resource) {
            return self.enter();
        }
        if !self.claims(resource) {
            return self.drain_deferred(resource);
        }
        vec![]
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════════

    fn ack(&mut self, to: ProcessId, resource: ResourceId) -> Action {
        let timestamp = self.clock.tick_on_send();
        trace!(to = %to, resource = %resource, clock = timestamp.0, "Sending ack");
        Action::Send {
            to,
            message: AckResponse::new(self.local_id(), timestamp, resource).into(),
        }
    }

    fn transition(&mut self, to: Phase) -> Action {
        let from = self.phase;
        self.phase = to;
        Action::EmitPhaseChange {
            process: self.local_id(),
            resource: self.held_or_sought,
            from,
            to,
            clock: self.clock.now(),
        }
    }
}
