//! Node state machine.

use crate::config::NodeConfig;
use citygate_arbiter::{ArbiterState, Policy, RandomPolicy};
use citygate_core::{Action, Event, StateMachine, TimerId};
use citygate_types::Topology;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Deterministic node index used by runners to address in-process nodes.
pub type NodeIndex = u32;

/// Combined node state machine.
///
/// Wraps the arbiter and owns the tick timer: every `Tick` re-arms the timer
/// before the arbiter runs, so the loop keeps going whatever the arbiter does.
pub struct NodeStateMachine {
    /// Node index (runner addressing).
    index: NodeIndex,

    /// Arbitration state.
    arbiter: ArbiterState,

    /// Node configuration.
    config: NodeConfig,

    /// Time last set by the runner.
    now: Duration,
}

impl std::fmt::Debug for NodeStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStateMachine")
            .field("index", &self.index)
            .field("arbiter", &self.arbiter)
            .field("now", &self.now)
            .finish()
    }
}

impl NodeStateMachine {
    /// Create a node driven by the seeded [`RandomPolicy`] from `config`.
    pub fn new(index: NodeIndex, topology: Arc<dyn Topology>, config: NodeConfig) -> Self {
        let policy = RandomPolicy::new(config.policy.clone(), topology.local_process_id());
        Self::with_policy(index, topology, config, Box::new(policy))
    }

    /// Create a node with a custom decision policy.
    pub fn with_policy(
        index: NodeIndex,
        topology: Arc<dyn Topology>,
        config: NodeConfig,
        policy: Box<dyn Policy>,
    ) -> Self {
        Self {
            index,
            arbiter: ArbiterState::new(topology, config.arbiter.clone(), policy),
            config,
            now: Duration::ZERO,
        }
    }

    /// Actions to perform once at startup: arm the first tick.
    pub fn start(&self) -> Vec<Action> {
        vec![self.tick_timer()]
    }

    /// Get the node index.
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Get the arbiter state.
    pub fn arbiter(&self) -> &ArbiterState {
        &self.arbiter
    }

    /// Get the node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn tick_timer(&self) -> Action {
        Action::SetTimer {
            id: TimerId::Tick,
            duration: self.config.tick_interval,
        }
    }
}

impl StateMachine for NodeStateMachine {
    fn handle(&mut self, event: Event) -> Vec<Action> {
        trace!(
            node = self.index,
            event = event.type_name(),
            origin = ?event.origin(),
            now = ?self.now,
            "Handling event"
        );

        match event {
            Event::Tick => {
                let mut actions = vec![self.tick_timer()];
                actions.extend(self.arbiter.on_tick());
                actions
            }
            Event::RequestReceived { gossip } => self.arbiter.on_request(gossip),
            Event::AckReceived { ack } => self.arbiter.on_ack(ack),
            Event::CooldownUpdateReceived { update } => self.arbiter.on_cooldown_update(update),
        }
    }

    fn set_time(&mut self, now: Duration) {
        self.now = now;
    }

    fn now(&self) -> Duration {
        self.now
    }
}
